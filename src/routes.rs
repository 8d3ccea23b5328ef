use std::sync::Arc;

use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{Auth, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::cache::SessionCache;
use crate::diaries;
use crate::error::ApiError;
use crate::friends;
use crate::models::{Id, SocialType};
use crate::oauth::IdentityProvider;
use crate::paging::{range_or_recent, select};
use crate::reactions;
use crate::repo::{Repo, RepoError};
use crate::session;
use crate::validate::{validate_create, validate_reaction, validate_update, CreateDiaryRequest, ReactionRequest, UpdateDiaryRequest};

/// Months covered by emotion statistics when no complete range is given.
const EMOTION_FALLBACK_MONTHS: u32 = 1;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| ApiError::invalid(err.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|err, _| ApiError::invalid(err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _| ApiError::invalid(err.to_string()).into()))
        .service(
            web::scope("/diaries")
                .route("", web::post().to(create_diary))
                // fixed segments before the `{id}` catch-all
                .route("/friends", web::get().to(friends_feed))
                .route("/search/v1/{keyword}", web::get().to(search_diaries))
                .route("/tags/{tag_name}", web::get().to(diaries_by_tag))
                .route("/users/{user_id}", web::get().to(user_diaries))
                .route("/emotions/{user_id}", web::get().to(emotion_stats))
                .route("/mood/{user_id}", web::get().to(mood_stats))
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(get_diary))
                        .route(web::patch().to(update_diary))
                        .route(web::delete().to(delete_diary)),
                ),
        )
        .service(
            web::scope("/friends")
                .service(
                    web::resource("/request/{user_id}")
                        .route(web::get().to(received_requests))
                        .route(web::post().to(send_request))
                        .route(web::delete().to(cancel_request)),
                )
                .service(
                    web::resource("/allow/{sender_id}")
                        .route(web::post().to(accept_request))
                        .route(web::delete().to(reject_request)),
                )
                .route("/search/{nickname}", web::get().to(search_friends))
                .service(
                    web::resource("/{user_id}")
                        .route(web::get().to(list_friends))
                        .route(web::delete().to(unfriend)),
                ),
        )
        .service(
            web::resource("/reactions/{diary_id}")
                .route(web::get().to(list_reactions))
                .route(web::post().to(add_reaction))
                .route(web::put().to(update_reaction))
                .route(web::delete().to(remove_reaction)),
        )
        .service(
            web::scope("/auth")
                .route("/login", web::post().to(login))
                .route("/refresh_token", web::get().to(refresh_token))
                .route("/logout", web::post().to(logout))
                .route("/naver", web::get().to(naver_login)),
        )
        .route("/users/me", web::get().to(me));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub cache: Arc<dyn SessionCache>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Frontend origin the refresh endpoint redirects back to.
    pub service_url: String,
}

fn text(status: StatusCode, message: &'static str) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/plain; charset=utf-8")
        .body(message)
}

// ---------------- diaries ----------------

#[utoipa::path(
    post,
    path = "/diaries",
    request_body = CreateDiaryRequest,
    responses(
        (status = 201, description = "Diary saved", body = String),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_diary(auth: Auth, data: web::Data<AppState>, payload: web::Json<CreateDiaryRequest>) -> Result<HttpResponse, ApiError> {
    let input = validate_create(payload.into_inner())?;
    diaries::create(&*data.repo, auth.user_id, input, Utc::now()).await?;
    Ok(text(StatusCode::CREATED, diaries::CREATED))
}

#[utoipa::path(
    get,
    path = "/diaries/{id}",
    params(("id" = Id, Path, description = "Diary id")),
    responses(
        (status = 200, description = "Diary detail", body = diaries::DiaryDetail),
        (status = 400, description = "Diary does not exist"),
        (status = 403, description = "Private diary of another user")
    )
)]
pub async fn get_diary(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let detail = diaries::find(&*data.repo, path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[utoipa::path(
    patch,
    path = "/diaries/{id}",
    request_body = UpdateDiaryRequest,
    params(("id" = Id, Path, description = "Diary id")),
    responses(
        (status = 200, description = "Diary updated", body = String),
        (status = 400, description = "Validation failed or diary does not exist"),
        (status = 403, description = "Not the author")
    )
)]
pub async fn update_diary(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdateDiaryRequest>,
) -> Result<HttpResponse, ApiError> {
    let patch = validate_update(payload.into_inner())?;
    diaries::update(&*data.repo, path.into_inner(), auth.user_id, patch).await?;
    Ok(text(StatusCode::OK, diaries::UPDATED))
}

#[utoipa::path(
    delete,
    path = "/diaries/{id}",
    params(("id" = Id, Path, description = "Diary id")),
    responses(
        (status = 200, description = "Diary deleted", body = String),
        (status = 400, description = "Diary does not exist"),
        (status = 403, description = "Not the author")
    )
)]
pub async fn delete_diary(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    diaries::delete(&*data.repo, path.into_inner(), auth.user_id).await?;
    Ok(text(StatusCode::OK, diaries::DELETED))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserDiariesQuery {
    /// `Day`, `Week` or `Month`
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub last_index: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/diaries/users/{user_id}",
    params(("user_id" = Id, Path, description = "Shelf owner"), UserDiariesQuery),
    responses(
        (status = 200, description = "Diaries of the user", body = diaries::UserDiaries),
        (status = 400, description = "Invalid type or dates")
    )
)]
pub async fn user_diaries(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<UserDiariesQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let selection = select(q.kind.as_deref(), q.start_date.as_deref(), q.end_date.as_deref(), q.last_index)
        .map_err(ApiError::Validation)?;
    let shelf = diaries::list_user_diaries(&*data.repo, path.into_inner(), auth.user_id, selection).await?;
    Ok(HttpResponse::Ok().json(shelf))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CursorQuery {
    pub last_index: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/diaries/friends",
    params(CursorQuery),
    responses((status = 200, description = "Public diaries of friends", body = diaries::DiaryList))
)]
pub async fn friends_feed(auth: Auth, data: web::Data<AppState>, query: web::Query<CursorQuery>) -> Result<HttpResponse, ApiError> {
    let feed = diaries::friends_feed(&*data.repo, auth.user_id, query.last_index).await?;
    Ok(HttpResponse::Ok().json(feed))
}

#[utoipa::path(
    get,
    path = "/diaries/search/v1/{keyword}",
    params(("keyword" = String, Path, description = "Title fragment"), CursorQuery),
    responses((status = 200, description = "Own diaries whose title matches", body = diaries::DiaryList))
)]
pub async fn search_diaries(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CursorQuery>,
) -> Result<HttpResponse, ApiError> {
    let found = diaries::search_by_keyword(&*data.repo, auth.user_id, &path.into_inner(), query.last_index).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    get,
    path = "/diaries/tags/{tag_name}",
    params(("tag_name" = String, Path, description = "Tag name")),
    responses((status = 200, description = "Own diaries carrying the tag", body = diaries::DiaryList))
)]
pub async fn diaries_by_tag(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let found = diaries::search_by_tag(&*data.repo, auth.user_id, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StatsQuery {
    pub start_date: Option<String>,
    /// Also accepted as `endDate`.
    #[serde(alias = "endDate")]
    pub last_date: Option<String>,
}

#[utoipa::path(
    get,
    path = "/diaries/emotions/{user_id}",
    params(("user_id" = Id, Path, description = "Diary owner"), StatsQuery),
    responses(
        (status = 200, description = "Emotion counts", body = diaries::EmotionStats),
        (status = 400, description = "Malformed date")
    )
)]
pub async fn emotion_stats(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    query: web::Query<StatsQuery>,
) -> Result<HttpResponse, ApiError> {
    let range = range_or_recent(query.start_date.as_deref(), query.last_date.as_deref(), EMOTION_FALLBACK_MONTHS, Utc::now())
        .map_err(ApiError::Validation)?;
    let stats = diaries::emotion_stats(&*data.repo, path.into_inner(), auth.user_id, range).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/diaries/mood/{user_id}",
    params(("user_id" = Id, Path, description = "Diary owner")),
    responses((status = 200, description = "Mood counts over the last year", body = diaries::MoodStats))
)]
pub async fn mood_stats(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let stats = diaries::mood_stats(&*data.repo, path.into_inner(), auth.user_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

// ---------------- friends ----------------

#[utoipa::path(
    get,
    path = "/friends/{user_id}",
    params(("user_id" = Id, Path, description = "User whose friends to list")),
    responses((status = 200, description = "Friends", body = friends::FriendList))
)]
pub async fn list_friends(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(friends::friends_of(&*data.repo, path.into_inner()).await?))
}

#[utoipa::path(
    delete,
    path = "/friends/{user_id}",
    params(("user_id" = Id, Path, description = "Friend to remove")),
    responses(
        (status = 200, description = "Relation removed"),
        (status = 400, description = "No such relation")
    )
)]
pub async fn unfriend(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    friends::unfriend(&*data.repo, auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

#[utoipa::path(
    get,
    path = "/friends/request/{user_id}",
    params(("user_id" = Id, Path, description = "Receiver of the requests")),
    responses((status = 200, description = "Pending senders", body = friends::StrangerList))
)]
pub async fn received_requests(_auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(friends::received_requests(&*data.repo, path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/friends/request/{user_id}",
    params(("user_id" = Id, Path, description = "Receiver")),
    responses(
        (status = 201, description = "Request sent"),
        (status = 400, description = "Request not allowed in the current state")
    )
)]
pub async fn send_request(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    friends::request(&*data.repo, auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Created().finish())
}

#[utoipa::path(
    delete,
    path = "/friends/request/{user_id}",
    params(("user_id" = Id, Path, description = "Receiver of the request to cancel")),
    responses((status = 200, description = "Request cancelled"), (status = 400, description = "No pending request"))
)]
pub async fn cancel_request(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    friends::cancel(&*data.repo, auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

#[utoipa::path(
    post,
    path = "/friends/allow/{sender_id}",
    params(("sender_id" = Id, Path, description = "Sender of the request")),
    responses((status = 201, description = "Request accepted"), (status = 400, description = "No pending request"))
)]
pub async fn accept_request(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    friends::accept(&*data.repo, auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Created().finish())
}

#[utoipa::path(
    delete,
    path = "/friends/allow/{sender_id}",
    params(("sender_id" = Id, Path, description = "Sender of the request")),
    responses((status = 200, description = "Request rejected"), (status = 400, description = "No pending request"))
)]
pub async fn reject_request(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    friends::reject(&*data.repo, auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

#[utoipa::path(
    get,
    path = "/friends/search/{nickname}",
    params(("nickname" = String, Path, description = "Nickname fragment")),
    responses((status = 200, description = "Matching friends", body = [friends::UserSummary]))
)]
pub async fn search_friends(auth: Auth, data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(friends::search(&*data.repo, auth.user_id, &path.into_inner()).await?))
}

// ---------------- reactions ----------------

#[utoipa::path(
    get,
    path = "/reactions/{diary_id}",
    params(("diary_id" = Id, Path, description = "Diary id")),
    responses((status = 200, description = "Reactions on the diary", body = reactions::ReactionList))
)]
pub async fn list_reactions(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(reactions::list(&*data.repo, path.into_inner(), auth.user_id).await?))
}

#[utoipa::path(
    post,
    path = "/reactions/{diary_id}",
    request_body = ReactionRequest,
    params(("diary_id" = Id, Path, description = "Diary id")),
    responses((status = 201, description = "Reaction saved"), (status = 400, description = "Already reacted"))
)]
pub async fn add_reaction(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<ReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let reaction = validate_reaction(payload.into_inner())?;
    reactions::add(&*data.repo, path.into_inner(), auth.user_id, reaction).await?;
    Ok(HttpResponse::Created().finish())
}

#[utoipa::path(
    put,
    path = "/reactions/{diary_id}",
    request_body = ReactionRequest,
    params(("diary_id" = Id, Path, description = "Diary id")),
    responses((status = 200, description = "Reaction replaced"), (status = 400, description = "No reaction to replace"))
)]
pub async fn update_reaction(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<ReactionRequest>,
) -> Result<HttpResponse, ApiError> {
    let reaction = validate_reaction(payload.into_inner())?;
    reactions::update(&*data.repo, path.into_inner(), auth.user_id, reaction).await?;
    Ok(HttpResponse::Ok().finish())
}

#[utoipa::path(
    delete,
    path = "/reactions/{diary_id}",
    params(("diary_id" = Id, Path, description = "Diary id")),
    responses((status = 200, description = "Reaction removed"), (status = 400, description = "No reaction to remove"))
)]
pub async fn remove_reaction(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    reactions::remove(&*data.repo, path.into_inner(), auth.user_id).await?;
    Ok(HttpResponse::Ok().finish())
}

// ---------------- session ----------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub id: Id,
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value).path("/").http_only(true).finish()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "").path("/").max_age(CookieDuration::ZERO).finish()
}

fn cookie_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.cookie(name).map(|c| c.value().to_string())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; tokens set in the utk and rtk cookies", body = LoginResponse),
        (status = 401, description = "Provider rejected the code")
    )
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let LoginRequest { code, state } = payload.into_inner();
    let tokens = session::login(&*data.repo, &*data.cache, &*data.identity, &code, &state).await?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(ACCESS_COOKIE, tokens.access_token))
        .cookie(session_cookie(REFRESH_COOKIE, tokens.refresh_secret))
        .json(LoginResponse { id: tokens.user_id }))
}

#[utoipa::path(
    get,
    path = "/auth/refresh_token",
    responses(
        (status = 302, description = "Token reissued, redirect to the service"),
        (status = 401, description = "No refreshable session")
    )
)]
pub async fn refresh_token(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let access = cookie_value(&req, ACCESS_COOKIE);
    let secret = cookie_value(&req, REFRESH_COOKIE);
    let tokens = session::refresh(&*data.cache, access.as_deref(), secret.as_deref()).await?;
    Ok(HttpResponse::Found()
        .cookie(session_cookie(ACCESS_COOKIE, tokens.access_token))
        .cookie(session_cookie(REFRESH_COOKIE, tokens.refresh_secret))
        .insert_header((header::LOCATION, data.service_url.clone()))
        .finish())
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Logged out", body = String))
)]
pub async fn logout(req: HttpRequest, data: web::Data<AppState>) -> HttpResponse {
    let current = cookie_value(&req, ACCESS_COOKIE);
    session::logout(&*data.cache, current.as_deref()).await;
    HttpResponse::Ok()
        .cookie(expired_cookie(ACCESS_COOKIE))
        .cookie(expired_cookie(REFRESH_COOKIE))
        .content_type("text/plain; charset=utf-8")
        .body(session::LOGGED_OUT)
}

#[utoipa::path(
    get,
    path = "/auth/naver",
    responses(
        (status = 302, description = "Redirect to the Naver consent page"),
        (status = 503, description = "Naver login not configured")
    )
)]
pub async fn naver_login(data: web::Data<AppState>) -> HttpResponse {
    match data.identity.authorize_url(&session::new_state()) {
        Some(url) => HttpResponse::Found().insert_header((header::LOCATION, url)).finish(),
        None => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "naver_oauth_not_configured",
            "message": "Set NAVER_CLIENT_ID / NAVER_CLIENT_SECRET to enable Naver login"
        })),
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Id,
    pub nickname: String,
    pub email: String,
    pub profile_image: String,
    pub social_type: SocialType,
}

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let user = match data.repo.get_user(auth.user_id).await {
        Ok(u) => u,
        Err(RepoError::NotFound) => return Err(ApiError::Unauthorized("Unauthorized".into())),
        Err(e) => return Err(e.into()),
    };
    Ok(HttpResponse::Ok().json(MeResponse {
        id: user.id,
        nickname: user.nickname,
        email: user.email,
        profile_image: user.profile_image,
        social_type: user.social_type,
    }))
}
