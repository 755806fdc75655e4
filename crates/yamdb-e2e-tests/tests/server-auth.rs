use serde_json::{json, Value};
use tracing::info;
use tracing_test::traced_test;
use yamdb_e2e_tests::{
    bearer_client, email_for, launch_env, prepare_env, take_confirmation_code, TestUser,
};

#[tokio::test]
#[traced_test]
async fn test_signup_and_token() {
    let (args, _config_guard) = prepare_env("test_signup_and_token").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Anonymous).await.unwrap();

    let signup = json!({"username": "reader", "email": email_for("reader")});
    let response = client
        .post(env.api("auth/signup"))
        .json(&signup)
        .send()
        .await
        .unwrap();
    info!("Response: {:#?}", response);
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(signup, body);

    // repeated signup with same data just sends new code
    let response = client
        .post(env.api("auth/signup"))
        .json(&signup)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let _older = take_confirmation_code(&env.mail_dir, "reader").unwrap();
    let code = take_confirmation_code(&env.mail_dir, "reader").unwrap();

    let response = client
        .post(env.api("auth/token"))
        .json(&json!({"username": "reader", "confirmation_code": code}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().unwrap();

    let reader = bearer_client(token).unwrap();
    let response = reader.get(env.api("users/me")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());
    let me: Value = response.json().await.unwrap();
    assert_eq!("reader", me["username"]);
    assert_eq!("user", me["role"]);

    // code cannot be used twice
    let response = client
        .post(env.api("auth/token"))
        .json(&json!({"username": "reader", "confirmation_code": code}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["confirmation_code"].is_array());
}

#[tokio::test]
#[traced_test]
async fn test_signup_rejects_invalid() {
    let (args, _config_guard) = prepare_env("test_signup_rejects_invalid").await.unwrap();
    let (client, env) = launch_env(args, TestUser::User).await.unwrap();
    let anonymous = reqwest::Client::new();

    let response = anonymous
        .post(env.api("auth/signup"))
        .json(&json!({"username": "me", "email": "me@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["username"].is_array());

    let response = anonymous
        .post(env.api("auth/signup"))
        .json(&json!({"username": "someone", "email": "not-an-email"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    // existing username with different email
    let response = anonymous
        .post(env.api("auth/signup"))
        .json(&json!({"username": "user", "email": "other@example.com"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    // existing email with different username
    let response = anonymous
        .post(env.api("auth/signup"))
        .json(&json!({"username": "user2", "email": email_for("user")}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    let response = client.get(env.api("users/me")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
#[traced_test]
async fn test_token_errors() {
    let (args, _config_guard) = prepare_env("test_token_errors").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Anonymous).await.unwrap();

    let response = client
        .post(env.api("auth/token"))
        .json(&json!({"username": "nobody", "confirmation_code": "abc-def"}))
        .send()
        .await
        .unwrap();
    assert_eq!(404, response.status().as_u16());

    let response = client
        .post(env.api("auth/token"))
        .json(&json!({"username": "nobody"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    env.create_user("writer", yamdb_types::claim::Role::User)
        .await
        .unwrap();
    let response = client
        .post(env.api("auth/token"))
        .json(&json!({"username": "writer", "confirmation_code": "65f0a1b2-00112233445566778899aabbccddeeff"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
#[traced_test]
async fn test_bad_token_and_anonymous() {
    let (args, _config_guard) = prepare_env("test_bad_token_and_anonymous").await.unwrap();
    let (client, env) = launch_env(args, TestUser::Anonymous).await.unwrap();

    let forged = bearer_client("not.a.token").unwrap();
    let response = forged.get(env.api("titles")).send().await.unwrap();
    assert_eq!(401, response.status().as_u16());

    let response = client.get(env.api("titles")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client
        .post(env.api("categories"))
        .json(&json!({"name": "Books", "slug": "books"}))
        .send()
        .await
        .unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = client.get(env.api("users/me")).send().await.unwrap();
    assert_eq!(403, response.status().as_u16());

    let response = client.get(env.api("users")).send().await.unwrap();
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
#[traced_test]
async fn test_token_of_deleted_user() {
    let (args, _config_guard) = prepare_env("test_token_of_deleted_user").await.unwrap();
    let (admin, env) = launch_env(args, TestUser::Admin).await.unwrap();
    let user = env
        .client_for("leaving", yamdb_types::claim::Role::User)
        .await
        .unwrap();

    let response = user.get(env.api("users/me")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = admin
        .delete(env.api("users/leaving"))
        .send()
        .await
        .unwrap();
    assert_eq!(204, response.status().as_u16());

    let response = user.get(env.api("users/me")).send().await.unwrap();
    assert_eq!(401, response.status().as_u16());
}
