#![cfg(feature = "inmem-store")]

mod common;

use std::sync::Arc;

use actix_web::cookie::Cookie;
use actix_web::{test, web, App};
use moodiary::auth::{issue_token_with_ttl, ACCESS_COOKIE, REFRESH_COOKIE};
use moodiary::cache::{InMemoryCache, SessionCache};
use moodiary::repo::inmem::InMemRepo;
use moodiary::routes::config;
use moodiary::session::{refresh_key, REFRESH_TTL};
use serde_json::{json, Value};
use serial_test::serial;

use common::{set_secret, state, state_with, StubIdentity, SERVICE_URL};

fn cookie(resp: &actix_web::dev::ServiceResponse, name: &str) -> Option<Cookie<'static>> {
    resp.response().cookies().find(|c| c.name() == name).map(|c| c.into_owned())
}

fn utk(resp: &actix_web::dev::ServiceResponse) -> Option<Cookie<'static>> {
    cookie(resp, ACCESS_COOKIE)
}

#[actix_web::test]
#[serial]
async fn login_sets_cookie_and_reuses_account() {
    set_secret();
    let repo = InMemRepo::new();
    let cache = Arc::new(InMemoryCache::new());
    let app_state = state_with(&repo, cache.clone(), Arc::new(StubIdentity::naver("naver-123", "몽글")));
    let app = test::init_service(App::new().app_data(web::Data::new(app_state)).configure(config)).await;

    let login = || test::TestRequest::post().uri("/auth/login").set_json(json!({"code": "ok", "state": "xyz"})).to_request();

    let resp = test::call_service(&app, login()).await;
    assert_eq!(resp.status(), 200);
    let access = utk(&resp).expect("utk cookie");
    assert_eq!(access.http_only(), Some(true));
    assert_eq!(cookie(&resp, REFRESH_COOKIE).expect("rtk cookie").http_only(), Some(true));
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let id = body["id"].as_i64().unwrap();
    assert!(cache.get(&refresh_key(id)).await.unwrap().is_some());

    let resp = test::call_service(&app, login()).await;
    let again: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(again["id"], id);

    // the cookie alone authenticates
    let req = test::TestRequest::get().uri("/users/me").cookie(access).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let me: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(me["nickname"], "몽글");
    assert_eq!(me["socialType"], "naver");
}

#[actix_web::test]
#[serial]
async fn rejected_code_is_unauthorized() {
    set_secret();
    let repo = InMemRepo::new();
    let app_state = state_with(&repo, Arc::new(InMemoryCache::new()), Arc::new(StubIdentity::naver("n", "n")));
    let app = test::init_service(App::new().app_data(web::Data::new(app_state)).configure(config)).await;

    let req = test::TestRequest::post().uri("/auth/login").set_json(json!({"code": "bad", "state": "xyz"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
#[serial]
async fn refresh_reissues_expired_token_until_logout() {
    set_secret();
    let repo = InMemRepo::new();
    let cache = Arc::new(InMemoryCache::new());
    let app_state = state_with(&repo, cache.clone(), Arc::new(StubIdentity::naver("naver-1", "user")));
    let app = test::init_service(App::new().app_data(web::Data::new(app_state)).configure(config)).await;

    let req = test::TestRequest::post().uri("/auth/login").set_json(json!({"code": "ok", "state": "s"})).to_request();
    let resp = test::call_service(&app, req).await;
    let secret = cookie(&resp, REFRESH_COOKIE).expect("rtk cookie");
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let id = body["id"].as_i64().unwrap();

    let expired = issue_token_with_ttl(id, -3600).unwrap();
    let req = test::TestRequest::get().uri("/users/me").cookie(Cookie::new(ACCESS_COOKIE, expired.clone())).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let refresh = |access: &str, secret: Option<Cookie<'static>>| {
        let mut req = test::TestRequest::get().uri("/auth/refresh_token").cookie(Cookie::new(ACCESS_COOKIE, access.to_string()));
        if let Some(secret) = secret {
            req = req.cookie(secret);
        }
        req.to_request()
    };

    // the access token alone is not enough
    assert_eq!(test::call_service(&app, refresh(&expired, None)).await.status(), 401);

    let resp = test::call_service(&app, refresh(&expired, Some(secret.clone()))).await;
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers().get("location").unwrap(), SERVICE_URL);
    let fresh = utk(&resp).expect("new utk cookie");
    let rotated = cookie(&resp, REFRESH_COOKIE).expect("new rtk cookie");
    assert_ne!(rotated.value(), secret.value());
    let req = test::TestRequest::get().uri("/users/me").cookie(fresh).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    // the first secret was spent by the rotation
    assert_eq!(test::call_service(&app, refresh(&expired, Some(secret))).await.status(), 401);

    let req = test::TestRequest::post().uri("/auth/logout").cookie(Cookie::new(ACCESS_COOKIE, expired.clone())).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        let cleared = cookie(&resp, name).expect("cleared cookie");
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(actix_web::cookie::time::Duration::ZERO));
    }
    assert_eq!(test::read_body(resp).await, "정상적으로 로그아웃되었습니다.");
    assert!(cache.get(&refresh_key(id)).await.unwrap().is_none());

    assert_eq!(test::call_service(&app, refresh(&expired, Some(rotated))).await.status(), 401);
}

#[actix_web::test]
#[serial]
async fn tampered_refresh_entry_is_rejected() {
    set_secret();
    let repo = InMemRepo::new();
    let cache = Arc::new(InMemoryCache::new());
    let app_state = state_with(&repo, cache.clone(), Arc::new(StubIdentity::naver("naver-2", "user")));
    let app = test::init_service(App::new().app_data(web::Data::new(app_state)).configure(config)).await;

    let req = test::TestRequest::post().uri("/auth/login").set_json(json!({"code": "ok", "state": "s"})).to_request();
    let resp = test::call_service(&app, req).await;
    let secret = cookie(&resp, REFRESH_COOKIE).expect("rtk cookie");
    let body: Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    let id = body["id"].as_i64().unwrap();

    cache.set(&refresh_key(id), "garbage".into(), REFRESH_TTL).await.unwrap();

    let year_old = issue_token_with_ttl(id, -365 * 24 * 3600).unwrap();
    let req = test::TestRequest::get()
        .uri("/auth/refresh_token")
        .cookie(Cookie::new(ACCESS_COOKIE, year_old))
        .cookie(secret)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert!(utk(&resp).is_none());
}

#[actix_web::test]
#[serial]
async fn refresh_without_cookie_is_unauthorized() {
    set_secret();
    let repo = InMemRepo::new();
    let app = test::init_service(App::new().app_data(web::Data::new(state(&repo))).configure(config)).await;
    let req = test::TestRequest::get().uri("/auth/refresh_token").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
#[serial]
async fn naver_redirect_depends_on_configuration() {
    set_secret();
    let repo = InMemRepo::new();
    let app = test::init_service(App::new().app_data(web::Data::new(state(&repo))).configure(config)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/naver").to_request()).await;
    assert_eq!(resp.status(), 503);

    let app_state = state_with(&repo, Arc::new(InMemoryCache::new()), Arc::new(StubIdentity::naver("n", "n")));
    let app = test::init_service(App::new().app_data(web::Data::new(app_state)).configure(config)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/auth/naver").to_request()).await;
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with("https://nid.naver.com/oauth2.0/authorize?state="));
}
