use reqwest::Client;
use serde_json::Value;
use tokio::task::JoinSet;

use crate::error::{AppError, AppResult};
use crate::schemas::Photo;

const UPLOAD_ENDPOINT: &str = "https://api.imgbb.com/1/upload";

/// Upload one image to the external image host and return its descriptor.
pub async fn upload_image(
    client: &Client,
    api_key: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> AppResult<Photo> {
    let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
    let form = reqwest::multipart::Form::new().part("image", part);

    let response = client
        .post(UPLOAD_ENDPOINT)
        .query(&[("key", api_key)])
        .multipart(form)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(error = %error, "Image host request failed");
            AppError::Dependency("Image host is unreachable.".to_string())
        })?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let reason = body
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown image host error");
        return Err(AppError::Dependency(format!(
            "Image upload failed ({status}): {reason}"
        )));
    }

    parse_upload_response(&body, filename)
}

/// Extract the photo descriptor from an image-host response body.
pub fn parse_upload_response(body: &Value, filename: &str) -> AppResult<Photo> {
    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let data = body.get("data").and_then(Value::as_object);

    let (Some(data), true) = (data, success) else {
        return Err(AppError::Dependency(format!(
            "Image upload failed for '{filename}'."
        )));
    };

    let url = data
        .get("url")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AppError::Dependency(format!("Image host returned no URL for '{filename}'."))
        })?;

    Ok(Photo {
        url,
        thumbnail_url: data
            .get("thumb")
            .and_then(|thumb| thumb.get("url"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        title: data
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(filename)
            .to_string(),
        delete_url: data
            .get("delete_url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub uploaded: Vec<Photo>,
    pub failed: Vec<String>,
}

/// Scatter-gather upload: all files go up concurrently, results are
/// collected in submission order, and partial success is reported rather
/// than failing the whole batch.
pub async fn upload_many(
    client: &Client,
    api_key: &str,
    files: Vec<(String, Vec<u8>)>,
) -> UploadOutcome {
    let mut tasks = JoinSet::new();
    for (index, (filename, bytes)) in files.into_iter().enumerate() {
        let client = client.clone();
        let api_key = api_key.to_string();
        tasks.spawn(async move {
            let result = upload_image(&client, &api_key, &filename, bytes).await;
            (index, filename, result)
        });
    }

    let mut slots: Vec<Option<(String, AppResult<Photo>)>> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let Ok((index, filename, result)) = joined else {
            continue;
        };
        if slots.len() <= index {
            slots.resize_with(index + 1, || None);
        }
        slots[index] = Some((filename, result));
    }

    let mut outcome = UploadOutcome::default();
    for slot in slots.into_iter().flatten() {
        match slot {
            (_, Ok(photo)) => outcome.uploaded.push(photo),
            (filename, Err(error)) => {
                tracing::warn!(filename = %filename, error = %error, "Image upload failed");
                outcome.failed.push(filename);
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_upload_response;

    #[test]
    fn parses_a_successful_upload_response() {
        let body = json!({
            "success": true,
            "status": 200,
            "data": {
                "url": "https://i.ibb.co/abc/kitchen.jpg",
                "thumb": { "url": "https://i.ibb.co/abc/kitchen-thumb.jpg" },
                "title": "kitchen",
                "delete_url": "https://ibb.co/abc/delete"
            }
        });

        let photo = parse_upload_response(&body, "kitchen.jpg").unwrap();
        assert_eq!(photo.url, "https://i.ibb.co/abc/kitchen.jpg");
        assert_eq!(photo.thumbnail_url, "https://i.ibb.co/abc/kitchen-thumb.jpg");
        assert_eq!(photo.title, "kitchen");
        assert_eq!(photo.delete_url, "https://ibb.co/abc/delete");
    }

    #[test]
    fn missing_success_flag_or_url_is_an_error() {
        assert!(parse_upload_response(&json!({"success": false}), "a.jpg").is_err());
        assert!(parse_upload_response(
            &json!({"success": true, "data": {"title": "no url"}}),
            "a.jpg"
        )
        .is_err());
    }

    #[test]
    fn falls_back_to_the_filename_when_the_host_returns_no_title() {
        let body = json!({
            "success": true,
            "data": { "url": "https://i.ibb.co/abc/x.jpg" }
        });
        let photo = parse_upload_response(&body, "bathroom.jpg").unwrap();
        assert_eq!(photo.title, "bathroom.jpg");
        assert_eq!(photo.thumbnail_url, "");
    }
}
