use axum::{
    extract::{Multipart, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    services::imgbb,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/uploads/images", axum::routing::post(upload_images))
        .route(
            "/uploads/payment-proof",
            axum::routing::post(upload_payment_proof),
        )
}

/// Scatter-gather photo upload. All files go to the image host
/// concurrently; partial success is reported instead of failing the batch,
/// so the customer keeps whatever did upload.
async fn upload_images(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let api_key = imgbb_key(&state)?;
    let files = collect_files(multipart, state.config.upload_max_images).await?;
    if files.is_empty() {
        return Err(AppError::BadRequest(
            "Attach at least one image file.".to_string(),
        ));
    }

    let outcome = imgbb::upload_many(&state.http_client, api_key, files).await;
    if outcome.uploaded.is_empty() {
        return Err(AppError::Dependency(
            "All image uploads failed. Please try again.".to_string(),
        ));
    }

    Ok(Json(json!({
        "uploaded": outcome.uploaded,
        "failed": outcome.failed,
    })))
}

/// Single-image upload for the electronic-payment receipt.
async fn upload_payment_proof(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let api_key = imgbb_key(&state)?;
    let mut files = collect_files(multipart, 1).await?;
    let Some((filename, bytes)) = files.pop() else {
        return Err(AppError::BadRequest(
            "Attach the payment receipt image.".to_string(),
        ));
    };

    let photo = imgbb::upload_image(&state.http_client, api_key, &filename, bytes).await?;
    Ok(Json(json!({ "payment_proof": photo })))
}

async fn collect_files(
    mut multipart: Multipart,
    max_files: usize,
) -> AppResult<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("Invalid multipart payload: {error}")))?
    {
        if field.file_name().is_none() {
            continue;
        }
        if files.len() >= max_files {
            return Err(AppError::BadRequest(format!(
                "At most {max_files} images per upload."
            )));
        }

        let filename = field
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| format!("image-{}.jpg", files.len() + 1));
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::BadRequest(format!("Could not read upload: {error}")))?;
        if bytes.is_empty() {
            continue;
        }
        files.push((filename, bytes.to_vec()));
    }

    Ok(files)
}

fn imgbb_key(state: &AppState) -> AppResult<&str> {
    state.config.imgbb_api_key.as_deref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Image uploads are not configured. Set IMGBB_API_KEY.".to_string(),
        )
    })
}
