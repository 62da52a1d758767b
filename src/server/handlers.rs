//! Route handlers. Each one decodes its input, calls the repository and
//! maps the result to a response.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Item, ItemId, NewItem};

use super::error::{ApiError, ApiResult};
use super::AppState;

/// `{"message": ...}` body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `{"items": [...]}` body
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keyword: String,
}

/// GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello, World!".to_string(),
    })
}

/// POST /items - multipart `name`, `category`, `image`
pub async fn add_item(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<MessageResponse>> {
    let mut name = None;
    let mut category = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), format!("malformed multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => name = Some(read_text(field).await?),
            Some("category") => category = Some(read_text(field).await?),
            Some("image") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::rejected(e.status(), format!("failed to get image file: {}", e)))?;
                image = Some(bytes);
            }
            _ => {}
        }
    }

    let image = image
        .ok_or_else(|| ApiError::rejected(StatusCode::BAD_REQUEST, "failed to get image file"))?;
    let item = NewItem::new(
        name.unwrap_or_default(),
        category.unwrap_or_default(),
        image.to_vec(),
    )?;

    let item = state.repository.add_item(item).await?;

    Ok(Json(MessageResponse {
        message: format!(
            "item received: name={},category={},images={}",
            item.name, item.category, item.image_key
        ),
    }))
}

/// GET /items
pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<ItemsResponse>> {
    let items = state.repository.list_all().await?;
    Ok(Json(ItemsResponse { items }))
}

/// GET /search?keyword=
pub async fn search_items(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ItemsResponse>> {
    let items = state.repository.search(&query.keyword).await?;
    info!(keyword = %query.keyword, hits = items.len(), "Search");
    Ok(Json(ItemsResponse { items }))
}

/// GET /items/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Item>> {
    let id: ItemId = id.parse()?;
    let item = state.repository.get_by_id(id).await?;
    Ok(Json(item))
}

/// GET /image/{id} - the item's image, or the default image if the blob
/// is gone
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id: ItemId = id.parse()?;
    let bytes = state.repository.image_bytes(id).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::rejected(e.status(), format!("malformed form field: {}", e)))
}
