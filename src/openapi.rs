use crate::diaries::{DiaryDetail, DiaryItem, DiaryList, EmotionCount, EmotionStats, MoodCount, MoodStats, UserDiaries};
use crate::friends::{FriendList, StrangerList, UserSummary};
use crate::models::{DiaryStatus, MoodDegree, SocialType};
use crate::reactions::{ReactionItem, ReactionList};
use crate::routes::{LoginRequest, LoginResponse, MeResponse};
use crate::validate::{CreateDiaryRequest, ReactionRequest, UpdateDiaryRequest};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_diary,
        crate::routes::get_diary,
        crate::routes::update_diary,
        crate::routes::delete_diary,
        crate::routes::user_diaries,
        crate::routes::friends_feed,
        crate::routes::search_diaries,
        crate::routes::diaries_by_tag,
        crate::routes::emotion_stats,
        crate::routes::mood_stats,
        crate::routes::list_friends,
        crate::routes::unfriend,
        crate::routes::received_requests,
        crate::routes::send_request,
        crate::routes::cancel_request,
        crate::routes::accept_request,
        crate::routes::reject_request,
        crate::routes::search_friends,
        crate::routes::list_reactions,
        crate::routes::add_reaction,
        crate::routes::update_reaction,
        crate::routes::remove_reaction,
        crate::routes::login,
        crate::routes::refresh_token,
        crate::routes::logout,
        crate::routes::naver_login,
        crate::routes::me,
    ),
    components(schemas(
        DiaryStatus, MoodDegree, SocialType,
        CreateDiaryRequest, UpdateDiaryRequest, ReactionRequest,
        DiaryItem, DiaryDetail, DiaryList, UserDiaries,
        EmotionCount, EmotionStats, MoodCount, MoodStats,
        UserSummary, FriendList, StrangerList,
        ReactionItem, ReactionList,
        LoginRequest, LoginResponse, MeResponse
    )),
    tags(
        (name = "diaries", description = "Diary authoring, shelves and statistics"),
        (name = "friends", description = "Friend requests and relations"),
        (name = "reactions", description = "Emoji reactions on diaries"),
        (name = "auth", description = "Naver login and session tokens"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in ["/diaries", "/diaries/{id}", "/diaries/users/{user_id}", "/friends/allow/{sender_id}", "/reactions/{diary_id}", "/auth/login"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
