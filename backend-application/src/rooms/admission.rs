use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use backend_domain::{AddMemberOutcome, MembershipToken, RoomId, RoomStore};

use crate::{AppError, Metrics};

// Link-preview generators and crawlers get to render a room page without
// taking a seat.
const CRAWLER_PATTERN: &str = r"(?i)whatsapp|facebookexternalhit|facebot|telegrambot|twitterbot|linkedinbot|slackbot|discordbot|googlebot|bingbot|preview|crawler|spider|bot\b";
const ROOM_PATH_PATTERN: &str = r"^/room/([^/]+)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDenied {
    NoRoomMatch,
    RoomNotFound,
    RoomFull,
}

impl AdmissionDenied {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionDenied::NoRoomMatch => "no_room_match",
            AdmissionDenied::RoomNotFound => "room_not_found",
            AdmissionDenied::RoomFull => "room_full",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Continue to the room. `issued` is set when a fresh token must be
    /// written to the membership cookie.
    Allow {
        room_id: RoomId,
        issued: Option<MembershipToken>,
    },
    Deny(AdmissionDenied),
}

#[derive(Debug, Clone, Default)]
pub struct AdmissionRequest {
    pub path: String,
    pub user_agent: Option<String>,
    pub token: Option<MembershipToken>,
}

pub struct AdmissionController {
    store: Arc<dyn RoomStore>,
    metrics: Arc<Metrics>,
    capacity: usize,
    crawler: Regex,
    room_path: Regex,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn RoomStore>, metrics: Arc<Metrics>, capacity: usize) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            metrics,
            capacity,
            crawler: Regex::new(CRAWLER_PATTERN)?,
            room_path: Regex::new(ROOM_PATH_PATTERN)?,
        })
    }

    pub fn is_crawler(&self, user_agent: Option<&str>) -> bool {
        user_agent.map(|agent| self.crawler.is_match(agent)).unwrap_or(false)
    }

    pub fn room_from_path(&self, path: &str) -> Option<RoomId> {
        let captures = self.room_path.captures(path)?;
        RoomId::parse(captures.get(1)?.as_str()).ok()
    }

    pub async fn admit(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AppError> {
        let decision = self.decide(request).await?;
        match &decision {
            AdmissionDecision::Allow { room_id, issued } => {
                self.metrics.record_admission(true);
                if issued.is_some() {
                    info!("admitted new member to room {}", room_id);
                }
            }
            AdmissionDecision::Deny(reason) => {
                self.metrics.record_admission(false);
                info!("admission denied for {}: {}", request.path, reason.as_str());
            }
        }
        Ok(decision)
    }

    async fn decide(&self, request: &AdmissionRequest) -> Result<AdmissionDecision, AppError> {
        let Some(room_id) = self.room_from_path(&request.path) else {
            return Ok(AdmissionDecision::Deny(AdmissionDenied::NoRoomMatch));
        };

        if self.is_crawler(request.user_agent.as_deref()) {
            debug!("crawler allowed into room {} without a seat", room_id);
            return Ok(AdmissionDecision::Allow {
                room_id,
                issued: None,
            });
        }

        let Some(meta) = self.store.load_meta(&room_id).await? else {
            return Ok(AdmissionDecision::Deny(AdmissionDenied::RoomNotFound));
        };

        if let Some(token) = &request.token {
            if meta.has_member(token) {
                return Ok(AdmissionDecision::Allow {
                    room_id,
                    issued: None,
                });
            }
        }

        if meta.is_full(self.capacity) {
            return Ok(AdmissionDecision::Deny(AdmissionDenied::RoomFull));
        }

        // The meta snapshot above may be stale; the bounded add re-checks
        // capacity atomically.
        let token = MembershipToken::generate();
        let decision = match self.store.try_add_member(&room_id, &token, self.capacity).await? {
            AddMemberOutcome::Added | AddMemberOutcome::AlreadyMember => AdmissionDecision::Allow {
                room_id,
                issued: Some(token),
            },
            AddMemberOutcome::Full => AdmissionDecision::Deny(AdmissionDenied::RoomFull),
            AddMemberOutcome::RoomMissing => AdmissionDecision::Deny(AdmissionDenied::RoomNotFound),
        };
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend_infrastructure::MemoryStore;

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/120.0";

    async fn controller_with_room(room: &str) -> (AdmissionController, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .create_room(&RoomId::parse(room).unwrap(), 1, 600)
            .await
            .unwrap();
        let controller =
            AdmissionController::new(store.clone(), Arc::new(Metrics::default()), 2).unwrap();
        (controller, store)
    }

    fn request(path: &str, token: Option<&MembershipToken>) -> AdmissionRequest {
        AdmissionRequest {
            path: path.to_string(),
            user_agent: Some(BROWSER.to_string()),
            token: token.cloned(),
        }
    }

    fn issued(decision: AdmissionDecision) -> MembershipToken {
        match decision {
            AdmissionDecision::Allow {
                issued: Some(token),
                ..
            } => token,
            other => panic!("expected a fresh token, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn third_sequential_join_is_room_full() {
        let (controller, store) = controller_with_room("R").await;

        let t1 = issued(controller.admit(&request("/room/R", None)).await.unwrap());
        let t2 = issued(controller.admit(&request("/room/R", None)).await.unwrap());
        assert_ne!(t1, t2);

        let third = controller.admit(&request("/room/R", None)).await.unwrap();
        assert_eq!(third, AdmissionDecision::Deny(AdmissionDenied::RoomFull));

        let meta = store
            .load_meta(&RoomId::parse("R").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.connected, vec![t1, t2]);
    }

    #[tokio::test]
    async fn returning_member_keeps_seat_without_new_token() {
        let (controller, _store) = controller_with_room("R").await;
        let t1 = issued(controller.admit(&request("/room/R", None)).await.unwrap());
        let _t2 = issued(controller.admit(&request("/room/R", None)).await.unwrap());

        let again = controller.admit(&request("/room/R", Some(&t1))).await.unwrap();
        assert_eq!(
            again,
            AdmissionDecision::Allow {
                room_id: RoomId::parse("R").unwrap(),
                issued: None,
            }
        );
    }

    #[tokio::test]
    async fn unknown_token_gets_a_fresh_one() {
        let (controller, _store) = controller_with_room("R").await;
        let stale = MembershipToken::generate();
        let fresh = issued(controller.admit(&request("/room/R", Some(&stale))).await.unwrap());
        assert_ne!(fresh, stale);
    }

    #[tokio::test]
    async fn missing_room_and_bad_paths_are_denied() {
        let (controller, _store) = controller_with_room("R").await;
        assert_eq!(
            controller.admit(&request("/room/nope", None)).await.unwrap(),
            AdmissionDecision::Deny(AdmissionDenied::RoomNotFound)
        );
        for path in ["/room", "/room/", "/room/R/extra", "/elsewhere", "/room/a:b"] {
            assert_eq!(
                controller.admit(&request(path, None)).await.unwrap(),
                AdmissionDecision::Deny(AdmissionDenied::NoRoomMatch),
                "path {}",
                path
            );
        }
    }

    #[tokio::test]
    async fn crawlers_pass_without_taking_a_seat() {
        let (controller, store) = controller_with_room("R").await;
        for agent in [
            "facebookexternalhit/1.1",
            "Mozilla/5.0 (compatible; Discordbot/2.0)",
            "TelegramBot (like TwitterBot)",
            "WhatsApp/2.23",
            "some-link-preview-fetcher",
        ] {
            let decision = controller
                .admit(&AdmissionRequest {
                    path: "/room/R".to_string(),
                    user_agent: Some(agent.to_string()),
                    token: None,
                })
                .await
                .unwrap();
            assert!(
                matches!(decision, AdmissionDecision::Allow { issued: None, .. }),
                "agent {}",
                agent
            );
        }
        let meta = store
            .load_meta(&RoomId::parse("R").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(meta.connected.is_empty());
    }

    #[test]
    fn bot_suffix_needs_a_word_boundary() {
        let controller = AdmissionController::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Metrics::default()),
            2,
        )
        .unwrap();
        assert!(controller.is_crawler(Some("MyBot")));
        assert!(!controller.is_crawler(Some("robotics-browser")));
        assert!(!controller.is_crawler(Some(BROWSER)));
        assert!(!controller.is_crawler(None));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_visitors_share_the_last_seat() {
        let (controller, store) = controller_with_room("R").await;
        let first = issued(controller.admit(&request("/room/R", None)).await.unwrap());
        let controller = Arc::new(controller);

        let visitors: Vec<_> = (0..8)
            .map(|_| {
                let controller = controller.clone();
                tokio::spawn(async move { controller.admit(&request("/room/R", None)).await.unwrap() })
            })
            .collect();
        let mut seated = Vec::new();
        for visitor in visitors {
            match visitor.await.unwrap() {
                AdmissionDecision::Allow {
                    issued: Some(token),
                    ..
                } => seated.push(token),
                AdmissionDecision::Deny(reason) => assert_eq!(reason, AdmissionDenied::RoomFull),
                other => panic!("unexpected decision {:?}", other),
            }
        }

        assert_eq!(seated.len(), 1);
        let meta = store
            .load_meta(&RoomId::parse("R").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.connected, vec![first, seated.remove(0)]);
    }
}
