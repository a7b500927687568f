//! HTTP plumbing shared by the routing providers.

use std::time::Duration;

use catchment_core::IsochroneError;
use geojson::FeatureCollection;
use reqwest::{Client, Response, StatusCode};

use super::ProviderBuildError;

/// Build the client every provider uses for its requests.
pub(super) fn build_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<Client, ProviderBuildError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(ProviderBuildError::HttpClient)
}

/// Convert a reqwest error to an `IsochroneError`.
pub(super) fn request_error(
    error: &reqwest::Error,
    url: &str,
    timeout: Duration,
    provider: &str,
) -> IsochroneError {
    if error.is_timeout() {
        return IsochroneError::Timeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        };
    }

    if let Some(status) = error.status() {
        return status_error(status, url, error.to_string(), provider);
    }

    IsochroneError::NetworkError {
        url: url.to_owned(),
        message: error.to_string(),
    }
}

/// Map a non-success status to an `IsochroneError`.
///
/// 401 and 403 mean the backend rejected the configured key.
pub(super) fn status_error(
    status: StatusCode,
    url: &str,
    message: String,
    provider: &str,
) -> IsochroneError {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return IsochroneError::Unauthorized {
            provider: provider.to_owned(),
        };
    }
    IsochroneError::HttpError {
        url: url.to_owned(),
        status: status.as_u16(),
        message,
    }
}

/// Check the status of `response` and parse its body as GeoJSON.
pub(super) async fn read_collection(
    response: Response,
    url: &str,
    timeout: Duration,
    provider: &str,
) -> Result<FeatureCollection, IsochroneError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(status_error(status, url, message, provider));
    }

    let body = response
        .text()
        .await
        .map_err(|err| request_error(&err, url, timeout, provider))?;
    body.parse()
        .map_err(|err: geojson::Error| IsochroneError::ParseError {
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::UNAUTHORIZED)]
    #[case(StatusCode::FORBIDDEN)]
    fn rejected_key_maps_to_unauthorized(#[case] status: StatusCode) {
        let err = status_error(status, "https://ors", String::new(), "ors");

        assert_eq!(
            err,
            IsochroneError::Unauthorized {
                provider: "ors".to_owned()
            }
        );
    }

    #[rstest]
    fn other_status_maps_to_http_error() {
        let err = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            "https://valhalla",
            "quota exceeded".to_owned(),
            "valhalla",
        );

        assert!(matches!(err, IsochroneError::HttpError { status: 429, .. }));
    }
}
