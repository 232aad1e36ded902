//! Integration tests for the retrying fetcher and the media verifier.
//!
//! Backoff is observed through a recording sleeper, so no test waits on a
//! real timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use streamsift::fingerprint::{BrowserProfile, ROTATING_AGENTS};
use streamsift::http_client::{FetchPolicy, Fetcher, Sleeper};
use streamsift::MediaVerifier;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

fn fetcher(profile: BrowserProfile, policy: FetchPolicy) -> (Fetcher, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = Fetcher::new(profile, policy, Duration::from_secs(5))
        .unwrap()
        .with_sleeper(sleeper.clone());
    (fetcher, sleeper)
}

/// Exact `User-Agent` match; agents contain commas, which the `header`
/// matcher would split.
fn user_agent(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |request: &Request| {
        request
            .headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            == Some(expected)
    }
}

fn default_policy() -> FetchPolicy {
    FetchPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_secs(2),
        courtesy_delay: None,
    }
}

mod retry {
    use super::*;

    #[tokio::test]
    async fn retries_server_errors_with_doubling_backoff() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/episode"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episode"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let (fetcher, sleeper) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        let body = fetcher
            .get_text(&format!("{}/episode", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<html>ok</html>");
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            // three for get_text, three for get_page
            .expect(6)
            .mount(&server)
            .await;

        let (fetcher, sleeper) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        let err = fetcher
            .get_text(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();

        assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
        // No sleep after the final attempt.
        assert_eq!(sleeper.delays().len(), 2);
        assert!(fetcher.get_page(&format!("{}/down", server.uri())).await.is_none());
    }

    #[tokio::test]
    async fn retries_after_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_body_string("on time"))
            .mount(&server)
            .await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let fetcher = Fetcher::new(
            BrowserProfile::desktop(&server.uri()),
            default_policy(),
            Duration::from_millis(300),
        )
        .unwrap()
        .with_sleeper(sleeper.clone());

        let body = fetcher
            .get_text(&format!("{}/slow", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "on time");
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn connection_errors_are_retried_then_reported() {
        let (fetcher, sleeper) = fetcher(BrowserProfile::desktop("http://127.0.0.1:1"), default_policy());

        let err = fetcher
            .get_text("http://127.0.0.1:1/episode")
            .await
            .unwrap_err();

        assert!(err.status().is_none());
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn sends_site_referer() {
        let server = MockServer::start().await;
        let referer = format!("{}/", server.uri());

        Mock::given(method("GET"))
            .and(header("referer", referer.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        assert_eq!(
            fetcher.get_page(&format!("{}/page", server.uri())).await.as_deref(),
            Some("ok")
        );
    }

    #[tokio::test]
    async fn rotating_profile_changes_agent_per_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(user_agent(ROTATING_AGENTS[0]))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(user_agent(ROTATING_AGENTS[1]))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("<html>comic</html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let policy = FetchPolicy {
            courtesy_delay: Some(Duration::from_secs(1)),
            ..default_policy()
        };
        let (fetcher, sleeper) = fetcher(BrowserProfile::rotating(&server.uri()), policy);
        let body = fetcher.get_html(&format!("{}/chapter", server.uri())).await;

        assert_eq!(body.as_deref(), Some("<html>comic</html>"));
        // courtesy, backoff, courtesy
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(1)
            ]
        );
    }

    #[tokio::test]
    async fn html_check_does_not_retry_on_wrong_type() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string("{}"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, sleeper) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        assert!(fetcher.get_html(&format!("{}/x", server.uri())).await.is_none());
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn posts_form_fields() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/wp-admin/admin-ajax.php"))
            .and(body_string_contains("action=doo_player_ajax"))
            .and(body_string_contains("post=42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let (fetcher, _) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        let page = fetcher
            .post_form(
                &format!("{}/wp-admin/admin-ajax.php", server.uri()),
                &[("action", "doo_player_ajax"), ("post", "42")],
            )
            .await
            .unwrap();
        assert_eq!(page.body, "ok");
    }
}

mod verifier {
    use super::*;

    async fn verifier_for(server: &MockServer) -> (MediaVerifier, Arc<RecordingSleeper>) {
        let (fetcher, sleeper) = fetcher(BrowserProfile::desktop(&server.uri()), default_policy());
        (MediaVerifier::new(&fetcher), sleeper)
    }

    #[tokio::test]
    async fn accepts_video_and_hls_types() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/a.mp4"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "Video/MP4"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/b.m3u8"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/vnd.apple.mpegurl"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/c"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("content-type", "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let (verifier, _) = verifier_for(&server).await;
        assert!(verifier.verify(&format!("{}/a.mp4", server.uri())).await);
        assert!(verifier.verify(&format!("{}/b.m3u8", server.uri())).await);
        assert!(verifier.verify(&format!("{}/c", server.uri())).await);
    }

    #[tokio::test]
    async fn rejects_html_and_errors_without_retry() {
        let server = MockServer::start().await;

        Mock::given(method("HEAD"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404).insert_header("content-type", "video/mp4"))
            .expect(1)
            .mount(&server)
            .await;

        let (verifier, sleeper) = verifier_for(&server).await;
        assert!(!verifier.verify(&format!("{}/page", server.uri())).await);
        assert!(!verifier.verify(&format!("{}/gone.mp4", server.uri())).await);
        assert!(!verifier.verify("http://127.0.0.1:1/unreachable.mp4").await);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn probe_reports_final_url_after_redirect() {
        let server = MockServer::start().await;
        let target = format!("{}/cdn/video.mp4", server.uri());

        Mock::given(method("HEAD"))
            .and(path("/embed/1"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/cdn/video.mp4"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "video/mp4"))
            .mount(&server)
            .await;

        let (verifier, _) = verifier_for(&server).await;
        let head = verifier
            .probe(&format!("{}/embed/1", server.uri()))
            .await
            .unwrap();
        assert_eq!(head.final_url, target);
        assert_eq!(head.content_type, "video/mp4");
    }
}
