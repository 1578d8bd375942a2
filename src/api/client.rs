use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{
    AsyncJobResponse, JobStatus, LibraryEntry, PipelineRequest, PresignedUrl,
    PresignedUrlRequest, StoryRequest, VisionRequest,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Anything that can report the status of a backend job.
///
/// The poller only needs this one call, which keeps it testable without HTTP.
pub trait StatusSource: Send + Sync {
    fn job_status(
        &self,
        run_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<JobStatus, ApiError>> + Send;
}

/// The full set of backend calls the wizard makes.
pub trait Backend: StatusSource {
    fn analyze_drawing(
        &self,
        image_base64: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<AsyncJobResponse, ApiError>> + Send;

    fn generate_story(
        &self,
        req: &StoryRequest<'_>,
    ) -> impl Future<Output = Result<AsyncJobResponse, ApiError>> + Send;

    fn generate_video(
        &self,
        req: &PipelineRequest<'_>,
    ) -> impl Future<Output = Result<AsyncJobResponse, ApiError>> + Send;

    fn library(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<LibraryEntry>, ApiError>> + Send;

    fn save_to_library(
        &self,
        entry: &LibraryEntry,
        user_id: &str,
    ) -> impl Future<Output = Result<LibraryEntry, ApiError>> + Send;

    fn delete_from_library(
        &self,
        id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn presigned_url(
        &self,
        s3_key: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<PresignedUrl, ApiError>> + Send;
}

/// HTTP client for the NoComelon backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends `api/v1/<segments>` to the base URL, keeping any path prefix.
    ///
    /// Each segment is percent-encoded on its own, so ids cannot reach
    /// another endpoint.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ApiError::InvalidUrl(format!("invalid path segment {bad:?}")));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{}: cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn post_job<B: serde::Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<AsyncJobResponse, ApiError> {
        let response = self.client.post(self.endpoint(segments)?).json(body).send().await?;
        decode(response).await
    }
}

/// Turns a non-2xx response into [`ApiError::Status`], otherwise decodes the JSON body.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let response = check(response).await?;
    Ok(response.json::<T>().await?)
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

impl StatusSource for ApiClient {
    async fn job_status(&self, run_id: &str, user_id: &str) -> Result<JobStatus, ApiError> {
        let url = self.endpoint(&["jobs", run_id, "status"])?;
        let response = self
            .client
            .get(url)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        decode(response).await
    }
}

impl Backend for ApiClient {
    async fn analyze_drawing(
        &self,
        image_base64: &str,
        user_id: &str,
    ) -> Result<AsyncJobResponse, ApiError> {
        let body = VisionRequest {
            image_base64,
            user_id,
        };
        self.post_job(&["vision", "analyze"], &body).await
    }

    async fn generate_story(&self, req: &StoryRequest<'_>) -> Result<AsyncJobResponse, ApiError> {
        self.post_job(&["story", "generate"], req).await
    }

    async fn generate_video(
        &self,
        req: &PipelineRequest<'_>,
    ) -> Result<AsyncJobResponse, ApiError> {
        self.post_job(&["pipeline", "generate"], req).await
    }

    async fn library(&self, user_id: &str) -> Result<Vec<LibraryEntry>, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&["library"])?)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        decode(response).await
    }

    async fn save_to_library(
        &self,
        entry: &LibraryEntry,
        user_id: &str,
    ) -> Result<LibraryEntry, ApiError> {
        let response = self
            .client
            .post(self.endpoint(&["library"])?)
            .query(&[("user_id", user_id)])
            .json(entry)
            .send()
            .await?;
        decode(response).await
    }

    async fn delete_from_library(&self, id: &str, user_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.endpoint(&["library", id])?)
            .query(&[("user_id", user_id)])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn presigned_url(&self, s3_key: &str, user_id: &str) -> Result<PresignedUrl, ApiError> {
        let response = self
            .client
            .post(self.endpoint(&["storage", "presigned-url"])?)
            .query(&[("user_id", user_id)])
            .json(&PresignedUrlRequest { s3_key })
            .send()
            .await?;
        decode(response).await
    }
}
