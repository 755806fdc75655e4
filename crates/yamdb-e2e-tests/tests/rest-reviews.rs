use serde_json::{json, Value};
use tracing::info;
use tracing_test::traced_test;
use yamdb_dal::{comment::Comment, review::Review, title::Title};
use yamdb_e2e_tests::{
    extend_url, launch_env, prepare_env,
    rest::{comments_url, create_comment, create_review, reviews_url, seed_catalog, Page},
    TestUser,
};
use yamdb_types::claim::Role;

#[tokio::test]
#[traced_test]
async fn test_reviews_and_rating() {
    let (args, _config_guard) = prepare_env("test_reviews_and_rating").await.unwrap();
    let (admin, env) = launch_env(args, TestUser::Admin).await.unwrap();
    let api_url = env.api("");
    let title = seed_catalog(&admin, &api_url).await.unwrap();

    let alice = env.client_for("alice", Role::User).await.unwrap();
    let bob = env.client_for("bob", Role::User).await.unwrap();

    let review = create_review(&alice, &api_url, title.id, "Masterpiece", 10)
        .await
        .unwrap();
    assert_eq!("alice", review.author);
    assert_eq!(10, review.score);
    create_review(&bob, &api_url, title.id, "Fine", 5).await.unwrap();

    // second review of same title by same author
    let response = alice
        .post(reviews_url(&api_url, title.id))
        .json(&json!({"text": "Again", "score": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    info!("Duplicate review: {body}");
    assert!(body["non_field_errors"].is_array());

    for score in [0, 11] {
        let response = admin
            .post(reviews_url(&api_url, title.id))
            .json(&json!({"text": "Out of range", "score": score}))
            .send()
            .await
            .unwrap();
        assert_eq!(400, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        assert!(body["score"].is_array());
    }

    let anonymous = reqwest::Client::new();
    let title_url = extend_url(&env.api("titles"), title.id);
    let fetched: Title = anonymous
        .get(title_url)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!((fetched.rating - 7.5).abs() < f64::EPSILON);

    let page: Page<Review> = anonymous
        .get(reviews_url(&api_url, title.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(2, page.count);

    let response = anonymous
        .post(reviews_url(&api_url, title.id))
        .json(&json!({"text": "Anonymous", "score": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = anonymous
        .get(reviews_url(&api_url, title.id + 100))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
#[traced_test]
async fn test_review_permissions() {
    let (args, _config_guard) = prepare_env("test_review_permissions").await.unwrap();
    let (admin, env) = launch_env(args, TestUser::Admin).await.unwrap();
    let api_url = env.api("");
    let title = seed_catalog(&admin, &api_url).await.unwrap();

    let author = env.client_for("author", Role::User).await.unwrap();
    let other = env.client_for("other", Role::User).await.unwrap();
    let moderator = env.client_for("moderator", Role::Moderator).await.unwrap();

    let review = create_review(&author, &api_url, title.id, "Good", 8)
        .await
        .unwrap();
    let review_url = extend_url(&reviews_url(&api_url, title.id), review.id);

    let response = other
        .patch(review_url.clone())
        .json(&json!({"text": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = author
        .patch(review_url.clone())
        .json(&json!({"score": 9}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let updated: Review = response.json().await.unwrap();
    assert_eq!(9, updated.score);
    assert_eq!("Good", updated.text);

    let response = moderator
        .patch(review_url.clone())
        .json(&json!({"text": "Moderated"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let updated: Review = response.json().await.unwrap();
    assert_eq!("author", updated.author);

    let comment = create_comment(&other, &api_url, title.id, review.id, "Disagree")
        .await
        .unwrap();

    let response = other.delete(review_url.clone()).send().await.unwrap();
    assert_eq!(403, response.status().as_u16());
    let response = moderator.delete(review_url.clone()).send().await.unwrap();
    assert_eq!(204, response.status().as_u16());

    let response = other.get(review_url).send().await.unwrap();
    assert_eq!(404, response.status().as_u16());

    // comment of deleted review is not reachable any more
    let comment_url = extend_url(&comments_url(&api_url, title.id, review.id), comment.id);
    let response = other.get(comment_url).send().await.unwrap();
    assert_eq!(404, response.status().as_u16());
}

#[tokio::test]
#[traced_test]
async fn test_comments() {
    let (args, _config_guard) = prepare_env("test_comments").await.unwrap();
    let (admin, env) = launch_env(args, TestUser::Admin).await.unwrap();
    let api_url = env.api("");
    let title = seed_catalog(&admin, &api_url).await.unwrap();
    let user = env.client_for("user", Role::User).await.unwrap();
    let other = env.client_for("other", Role::User).await.unwrap();

    let review = create_review(&user, &api_url, title.id, "Funny", 7)
        .await
        .unwrap();
    for text in ["First", "Second", "Third"] {
        create_comment(&other, &api_url, title.id, review.id, text)
            .await
            .unwrap();
    }

    let mut url = comments_url(&api_url, title.id, review.id);
    url.set_query(Some("limit=2&offset=2"));
    let page: Page<Comment> = user.get(url).send().await.unwrap().json().await.unwrap();
    assert_eq!(3, page.count);
    assert_eq!(1, page.results.len());
    assert_eq!(None, page.next);
    assert_eq!(Some(0), page.previous);

    let comment = create_comment(&user, &api_url, title.id, review.id, "Own")
        .await
        .unwrap();
    assert_eq!("user", comment.author);
    let comment_url = extend_url(&comments_url(&api_url, title.id, review.id), comment.id);

    let response = other
        .patch(comment_url.clone())
        .json(&json!({"text": "Changed"}))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = user
        .patch(comment_url.clone())
        .json(&json!({"text": "Edited"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let edited: Comment = response.json().await.unwrap();
    assert_eq!("Edited", edited.text);

    let response = user
        .post(comments_url(&api_url, title.id, review.id))
        .json(&json!({"text": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    // review must belong to the title in path
    let response = user
        .get(comments_url(&api_url, title.id + 1, review.id))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    let response = admin.delete(comment_url.clone()).send().await.unwrap();
    assert_eq!(204, response.status().as_u16());
    let response = user.get(comment_url).send().await.unwrap();
    assert_eq!(404, response.status().as_u16());
}
