#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use moodiary::models::DiaryStatus;
use moodiary::repo::inmem::InMemRepo;
use moodiary::repo::ReactionRepo;
use moodiary::routes::config;
use serde_json::{json, Value};
use serial_test::serial;

use common::{bearer, diary, set_secret, state, user};

macro_rules! app {
    ($repo:expr) => {
        test::init_service(App::new().app_data(web::Data::new(state(&$repo))).configure(config)).await
    };
}

async fn json_body(resp: actix_web::dev::ServiceResponse) -> Value {
    serde_json::from_slice(&test::read_body(resp).await).unwrap()
}

#[actix_web::test]
#[serial]
async fn one_reaction_per_user_and_diary() {
    set_secret();
    let repo = InMemRepo::new();
    let author = user(&repo, "author").await;
    let reader = user(&repo, "reader").await;
    let d = diary(&repo, author.id, DiaryStatus::Public).await;
    let app = app!(repo);
    let uri = format!("/reactions/{}", d.id);

    let req = test::TestRequest::post().uri(&uri).insert_header(bearer(reader.id)).set_json(json!({"reaction": "👍"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::post().uri(&uri).insert_header(bearer(reader.id)).set_json(json!({"reaction": "🔥"})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["message"], "이미 리액션을 남긴 일기입니다.");

    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(author.id)).to_request();
    let body = json_body(test::call_service(&app, req).await).await;
    assert_eq!(body["reactionList"], json!([{"userId": reader.id, "nickname": "reader", "profileImage": "testImage", "reaction": "👍"}]));

    let req = test::TestRequest::get().uri(&format!("/diaries/{}", d.id)).insert_header(bearer(author.id)).to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await["reactionCount"], 1);

    let req = test::TestRequest::put().uri(&uri).insert_header(bearer(reader.id)).set_json(json!({"reaction": "🔥"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert_eq!(repo.find_reaction(d.id, reader.id).await.unwrap().unwrap().reaction, "🔥");

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(reader.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(repo.find_reaction(d.id, reader.id).await.unwrap().is_none());

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(reader.id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["message"], "리액션 기록이 없습니다.");
}

#[actix_web::test]
#[serial]
async fn reactions_follow_diary_access_rules() {
    set_secret();
    let repo = InMemRepo::new();
    let author = user(&repo, "author").await;
    let reader = user(&repo, "reader").await;
    let private = diary(&repo, author.id, DiaryStatus::Private).await;
    let public = diary(&repo, author.id, DiaryStatus::Public).await;
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri(&format!("/reactions/{}", private.id))
        .insert_header(bearer(reader.id))
        .set_json(json!({"reaction": "👍"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post().uri("/reactions/9999").insert_header(bearer(reader.id)).set_json(json!({"reaction": "👍"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/reactions/{}", public.id))
        .insert_header(bearer(reader.id))
        .set_json(json!({"reaction": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["message"], json!(["reaction should not be empty"]));

    let req = test::TestRequest::put()
        .uri(&format!("/reactions/{}", public.id))
        .insert_header(bearer(reader.id))
        .set_json(json!({"reaction": "👍"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(json_body(resp).await["message"], "리액션 기록이 없습니다.");
}
