use std::sync::Arc;

use bson::DateTime;
use chrono::Duration;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info, warn};

use meetloop_config::SchedulerSettings;
use meetloop_db::models::Meeting;

use crate::dao::{DaoResult, EngagementDao, MeetingDao, UserDao};
use crate::messaging::{Messenger, OutboundMessage, TemplateKind};

/// Sends pre-meeting invite reminders.
///
/// An every-minute job picks up meetings starting inside the reminder window
/// whose `invite_sent_at` is still unset, messages every engaged user, and
/// stamps `invite_sent_at` so a later tick cannot re-send. The window is two
/// minutes wide around the lead time to absorb tick jitter.
pub struct ReminderScheduler {
    meetings: Arc<MeetingDao>,
    engagements: Arc<EngagementDao>,
    users: Arc<UserDao>,
    messenger: Arc<dyn Messenger>,
    lead_minutes: i64,
}

impl ReminderScheduler {
    pub fn new(
        meetings: Arc<MeetingDao>,
        engagements: Arc<EngagementDao>,
        users: Arc<UserDao>,
        messenger: Arc<dyn Messenger>,
        settings: &SchedulerSettings,
    ) -> Self {
        Self {
            meetings,
            engagements,
            users,
            messenger,
            lead_minutes: settings.reminder_lead_minutes,
        }
    }

    /// Registers the every-minute tick and starts the scheduler. The
    /// returned handle keeps the jobs alive.
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler, JobSchedulerError> {
        let scheduler = JobScheduler::new().await?;
        let lead_minutes = self.lead_minutes;
        let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
            let this = Arc::clone(&self);
            Box::pin(async move {
                if let Err(e) = this.tick().await {
                    error!(error = %e, "Reminder tick failed");
                }
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        info!(lead_minutes, "Reminder scheduler started");
        Ok(scheduler)
    }

    pub async fn tick(&self) -> DaoResult<()> {
        let now = chrono::Utc::now();
        let from = DateTime::from_chrono(now + Duration::minutes(self.lead_minutes - 1));
        let to = DateTime::from_chrono(now + Duration::minutes(self.lead_minutes + 1));

        let pending = self.meetings.list_pending_reminders(from, to).await?;
        if pending.is_empty() {
            debug!("No meetings due for reminders");
            return Ok(());
        }
        info!(count = pending.len(), "Meetings due for invite reminders");

        for meeting in &pending {
            self.remind(meeting).await?;
        }
        Ok(())
    }

    /// Best-effort per recipient; the meeting is marked processed even when
    /// it has no invitees, so it is never picked up twice.
    async fn remind(&self, meeting: &Meeting) -> DaoResult<()> {
        let Some(meeting_id) = meeting.id else {
            return Ok(());
        };

        let engagements = self.engagements.list_for_meeting(meeting_id).await?;
        let user_ids: Vec<_> = engagements.iter().map(|e| e.user_id).collect();
        let users = self.users.find_by_ids(&user_ids).await?;
        let start_date = format_reminder_date(meeting.start_date.to_chrono());

        for user in &users {
            let Some(user_id) = user.id else { continue };
            let Some(phone) = user.phone.as_deref().filter(|p| !p.is_empty()) else {
                debug!(email = %user.email, "Invitee has no phone, skipping reminder");
                continue;
            };
            let message = OutboundMessage {
                recipient: phone.to_string(),
                template: TemplateKind::Invite,
                dedup_key: format!("invite:{}:{}", meeting_id.to_hex(), user_id.to_hex()),
                parameters: vec![
                    first_name(&user.name).to_string(),
                    meeting.topic.clone(),
                    start_date.clone(),
                ],
            };
            match self.messenger.send_template(&message).await {
                Ok(provider_id) => {
                    debug!(email = %user.email, provider_id = %provider_id, "Invite reminder sent")
                }
                Err(e) => {
                    warn!(email = %user.email, error = %e, "Invite reminder failed")
                }
            }
        }

        self.meetings.mark_invites_sent(meeting_id).await?;
        info!(
            provider_meeting_id = %meeting.provider_meeting_id,
            invitees = users.len(),
            "Meeting reminder processed"
        );
        Ok(())
    }
}

fn first_name(full_name: &str) -> &str {
    full_name.trim().split_whitespace().next().unwrap_or("")
}

/// DD-MM-YYYY, matching the reminder template's date slot.
fn format_reminder_date(date: chrono::DateTime<chrono::Utc>) -> String {
    date.format("%d-%m-%Y").to_string()
}
