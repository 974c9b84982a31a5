use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::messaging::{Messenger, OutboundMessage, TemplateKind, recording_cta_link};

/// The slice of a meeting the dispatcher needs.
#[derive(Debug, Clone)]
pub struct MeetingRef {
    /// Internal id, hex-encoded; part of every dedup key.
    pub id: String,
    pub provider_meeting_id: String,
    pub topic: String,
    pub suppress_outreach: bool,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    /// Internal user id, hex-encoded; part of the dedup key.
    pub user_id: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub dedup_key: String,
    pub reason: String,
}

/// Outcome of one fan-out. Failures are data here, never errors: a partial
/// dispatch leaves the already-persisted attendance state untouched.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: Vec<String>,
    pub failed: Vec<DispatchFailure>,
    /// Recipients skipped for lack of a phone number.
    pub skipped: Vec<String>,
}

pub struct Dispatcher {
    messenger: Arc<dyn Messenger>,
    cta_number: String,
}

impl Dispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, cta_number: String) -> Self {
        Self {
            messenger,
            cta_number,
        }
    }

    /// One "rate your experience" prompt per attendee. Best-effort: each
    /// recipient send is independent and a failure never aborts the rest.
    pub async fn dispatch_surveys(
        &self,
        meeting: &MeetingRef,
        attendees: &[Recipient],
    ) -> DispatchReport {
        let report = self
            .fan_out(meeting, attendees, TemplateKind::Survey, "survey", |r| {
                vec![r.name.clone(), meeting.topic.clone()]
            })
            .await;
        info!(
            meeting_id = %meeting.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Survey dispatch finished"
        );
        report
    }

    /// "Missed you" outreach with the recording link, for invitees who never
    /// attended. Skipped wholesale when the meeting suppresses outreach.
    pub async fn dispatch_missed(
        &self,
        meeting: &MeetingRef,
        non_attendees: &[Recipient],
        recording_link: &str,
    ) -> DispatchReport {
        if meeting.suppress_outreach {
            debug!(meeting_id = %meeting.id, "Outreach suppressed for meeting");
            return DispatchReport::default();
        }

        let cta = recording_cta_link(&self.cta_number, &meeting.provider_meeting_id);
        let report = self
            .fan_out(meeting, non_attendees, TemplateKind::Missed, "missed", |r| {
                vec![
                    r.name.clone(),
                    meeting.topic.clone(),
                    recording_link.to_string(),
                    cta.clone(),
                ]
            })
            .await;
        info!(
            meeting_id = %meeting.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Missed-meeting dispatch finished"
        );
        report
    }

    async fn fan_out<F>(
        &self,
        meeting: &MeetingRef,
        recipients: &[Recipient],
        template: TemplateKind,
        key_prefix: &str,
        parameters: F,
    ) -> DispatchReport
    where
        F: Fn(&Recipient) -> Vec<String>,
    {
        let mut report = DispatchReport::default();

        let sends = recipients.iter().filter_map(|recipient| {
            let dedup_key = format!("{key_prefix}:{}:{}", meeting.id, recipient.user_id);
            let Some(phone) = recipient.phone.clone() else {
                report.skipped.push(dedup_key);
                return None;
            };
            let message = OutboundMessage {
                recipient: phone,
                template,
                dedup_key: dedup_key.clone(),
                parameters: parameters(recipient),
            };
            let messenger = Arc::clone(&self.messenger);
            Some(async move {
                let result = messenger.send_template(&message).await;
                (dedup_key, result)
            })
        });

        for (dedup_key, result) in join_all(sends).await {
            match result {
                Ok(_) => report.sent.push(dedup_key),
                Err(e) => {
                    warn!(%dedup_key, error = %e, "Notification send failed");
                    report.failed.push(DispatchFailure {
                        dedup_key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessagingError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every send; fails for recipients whose phone is on the
    /// failure list.
    struct FakeMessenger {
        sent: Mutex<Vec<OutboundMessage>>,
        fail_for: Vec<String>,
    }

    impl FakeMessenger {
        fn new(fail_for: Vec<String>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_for,
            })
        }
    }

    #[async_trait]
    impl Messenger for FakeMessenger {
        async fn send_template(
            &self,
            message: &OutboundMessage,
        ) -> Result<String, MessagingError> {
            if self.fail_for.contains(&message.recipient) {
                return Err(MessagingError::Api("simulated outage".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(format!("wamid.{}", message.dedup_key))
        }
    }

    fn meeting() -> MeetingRef {
        MeetingRef {
            id: "meet1".into(),
            provider_meeting_id: "987654".into(),
            topic: "Weekly Standup".into(),
            suppress_outreach: false,
        }
    }

    fn recipient(id: &str, phone: Option<&str>) -> Recipient {
        Recipient {
            user_id: id.into(),
            name: format!("User {id}"),
            phone: phone.map(String::from),
        }
    }

    #[tokio::test]
    async fn survey_fan_out_uses_dedup_keys() {
        let messenger = FakeMessenger::new(vec![]);
        let dispatcher = Dispatcher::new(messenger.clone(), "15550001111".into());

        let report = dispatcher
            .dispatch_surveys(
                &meeting(),
                &[
                    recipient("u1", Some("100")),
                    recipient("u2", Some("200")),
                ],
            )
            .await;

        assert_eq!(report.sent, vec!["survey:meet1:u1", "survey:meet1:u2"]);
        assert!(report.failed.is_empty());

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].template, TemplateKind::Survey);
        assert_eq!(sent[0].parameters, vec!["User u1", "Weekly Standup"]);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let messenger = FakeMessenger::new(vec!["200".into()]);
        let dispatcher = Dispatcher::new(messenger.clone(), "15550001111".into());

        let report = dispatcher
            .dispatch_surveys(
                &meeting(),
                &[
                    recipient("u1", Some("100")),
                    recipient("u2", Some("200")),
                    recipient("u3", Some("300")),
                ],
            )
            .await;

        assert_eq!(report.sent, vec!["survey:meet1:u1", "survey:meet1:u3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].dedup_key, "survey:meet1:u2");
        assert_eq!(messenger.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn recipients_without_phone_are_skipped() {
        let messenger = FakeMessenger::new(vec![]);
        let dispatcher = Dispatcher::new(messenger.clone(), "15550001111".into());

        let report = dispatcher
            .dispatch_surveys(
                &meeting(),
                &[recipient("u1", None), recipient("u2", Some("200"))],
            )
            .await;

        assert_eq!(report.skipped, vec!["survey:meet1:u1"]);
        assert_eq!(report.sent, vec!["survey:meet1:u2"]);
    }

    #[tokio::test]
    async fn missed_dispatch_includes_recording_and_cta() {
        let messenger = FakeMessenger::new(vec![]);
        let dispatcher = Dispatcher::new(messenger.clone(), "15550001111".into());

        let report = dispatcher
            .dispatch_missed(
                &meeting(),
                &[recipient("u9", Some("900"))],
                "https://rec.example.com/abc",
            )
            .await;

        assert_eq!(report.sent, vec!["missed:meet1:u9"]);
        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent[0].template, TemplateKind::Missed);
        assert_eq!(sent[0].parameters[2], "https://rec.example.com/abc");
        assert!(sent[0].parameters[3].contains("api.whatsapp.com"));
    }

    #[tokio::test]
    async fn suppressed_meeting_sends_nothing() {
        let messenger = FakeMessenger::new(vec![]);
        let dispatcher = Dispatcher::new(messenger.clone(), "15550001111".into());

        let mut m = meeting();
        m.suppress_outreach = true;
        let report = dispatcher
            .dispatch_missed(&m, &[recipient("u9", Some("900"))], "https://rec.example.com")
            .await;

        assert!(report.sent.is_empty());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }
}
