use anyhow::{anyhow, Result};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;
use yamdb_dal::{category::Category, comment::Comment, genre::Genre, review::Review, title::Title};

use crate::extend_url;

/// One page of list endpoint
#[derive(Debug, serde::Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

async fn created<T: DeserializeOwned>(response: Response) -> Result<T> {
    info!("Response: {:#?}", response);
    if response.status().as_u16() != 201 {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Expected 201, got {status}: {body}"));
    }
    Ok(response.json().await?)
}

pub async fn create_category(
    client: &reqwest::Client,
    api_url: &Url,
    name: &str,
    slug: &str,
) -> Result<Category> {
    let url = api_url.join("categories").unwrap();
    let response = client
        .post(url)
        .json(&json!({"name": name, "slug": slug}))
        .send()
        .await?;
    created(response).await
}

pub async fn create_genre(
    client: &reqwest::Client,
    api_url: &Url,
    name: &str,
    slug: &str,
) -> Result<Genre> {
    let url = api_url.join("genres").unwrap();
    let response = client
        .post(url)
        .json(&json!({"name": name, "slug": slug}))
        .send()
        .await?;
    created(response).await
}

pub async fn create_title(
    client: &reqwest::Client,
    api_url: &Url,
    name: &str,
    year: i32,
    genres: &[&str],
    category: &str,
) -> Result<Title> {
    let url = api_url.join("titles").unwrap();
    let response = client
        .post(url)
        .json(&json!({
            "name": name,
            "year": year,
            "description": format!("About {name}"),
            "genre": genres,
            "category": category,
        }))
        .send()
        .await?;
    created(response).await
}

pub fn reviews_url(api_url: &Url, title_id: i64) -> Url {
    extend_url(&extend_url(&api_url.join("titles").unwrap(), title_id), "reviews")
}

pub fn comments_url(api_url: &Url, title_id: i64, review_id: i64) -> Url {
    extend_url(&extend_url(&reviews_url(api_url, title_id), review_id), "comments")
}

pub async fn create_review(
    client: &reqwest::Client,
    api_url: &Url,
    title_id: i64,
    text: &str,
    score: i64,
) -> Result<Review> {
    let response = client
        .post(reviews_url(api_url, title_id))
        .json(&json!({"text": text, "score": score}))
        .send()
        .await?;
    created(response).await
}

pub async fn create_comment(
    client: &reqwest::Client,
    api_url: &Url,
    title_id: i64,
    review_id: i64,
    text: &str,
) -> Result<Comment> {
    let response = client
        .post(comments_url(api_url, title_id, review_id))
        .json(&json!({"text": text}))
        .send()
        .await?;
    created(response).await
}

/// Admin fixture: one category, two genres and a title using them
pub async fn seed_catalog(client: &reqwest::Client, api_url: &Url) -> Result<Title> {
    create_category(client, api_url, "Movie", "movie").await?;
    create_genre(client, api_url, "Drama", "drama").await?;
    create_genre(client, api_url, "Comedy", "comedy").await?;
    create_title(
        client,
        api_url,
        "The Gold Rush",
        1925,
        &["drama", "comedy"],
        "movie",
    )
    .await
}
