use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use tracing::{debug, info, warn};

use meetloop_db::models::{AttendanceRecord, Meeting, User};

use crate::dao::DaoResult;
use crate::dispatch::{Dispatcher, MeetingRef, Recipient};
use crate::reconcile::{ParticipantEvent, reconcile};
use crate::webhook::event::{LifecycleEvent, MeetingObject, ParticipantObject, RecordingObject};

use super::locks::MeetingLocks;
use super::store::LifecycleStore;

/// Drives a meeting through its lifecycle from provider webhook events.
///
/// Attendance sessions are persisted as they arrive, so an `ended` event can
/// finalize from the database alone even after a process restart. Finalization
/// runs at most once per meeting: the `notified_at` claim is taken before any
/// work, and replayed `ended` events lose the claim and return early.
pub struct LifecycleService {
    store: Arc<dyn LifecycleStore>,
    dispatcher: Arc<Dispatcher>,
    locks: MeetingLocks,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn LifecycleStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            locks: MeetingLocks::new(),
        }
    }

    pub async fn handle_event(&self, event: LifecycleEvent) -> DaoResult<()> {
        match event {
            LifecycleEvent::MeetingStarted { object } => self.handle_started(&object).await,
            LifecycleEvent::MeetingEnded { object } => self.handle_ended(&object).await,
            LifecycleEvent::ParticipantJoined {
                object,
                participant,
            } => self.handle_joined(&object, &participant).await,
            LifecycleEvent::ParticipantLeft {
                object,
                participant,
            } => self.handle_left(&object, &participant).await,
            LifecycleEvent::RecordingCompleted { object } => self.handle_recording(&object).await,
            LifecycleEvent::UrlValidation { .. } => Ok(()),
            LifecycleEvent::Unknown(event) => {
                debug!(event = %event, "Ignoring unhandled webhook event");
                Ok(())
            }
        }
    }

    async fn handle_started(&self, object: &MeetingObject) -> DaoResult<()> {
        let Some((meeting_id, _)) = self.lookup(&object.id).await? else {
            return Ok(());
        };
        let at = object
            .start_time
            .map(DateTime::from_chrono)
            .unwrap_or_else(DateTime::now);
        let first = self.store.mark_started(meeting_id, at).await?;
        if first {
            info!(provider_meeting_id = %object.id, "Meeting started");
        } else {
            debug!(provider_meeting_id = %object.id, "Replayed started event, start time kept");
        }
        Ok(())
    }

    async fn handle_joined(
        &self,
        object: &MeetingObject,
        participant: &ParticipantObject,
    ) -> DaoResult<()> {
        let Some((meeting_id, _)) = self.lookup(&object.id).await? else {
            return Ok(());
        };
        let user = self.store.find_user_by_email(&participant.email).await?;
        let joined_at = participant
            .join_time
            .map(DateTime::from_chrono)
            .unwrap_or_else(DateTime::now);
        let record = AttendanceRecord {
            id: None,
            meeting_id,
            user_id: user.and_then(|u| u.id),
            participant_email: participant.email.clone(),
            display_name: participant
                .user_name
                .clone()
                .unwrap_or_else(|| participant.email.clone()),
            joined_at,
            left_at: None,
            created_at: DateTime::now(),
        };
        self.store.open_session(&record).await?;
        debug!(
            provider_meeting_id = %object.id,
            email = %participant.email,
            "Participant joined"
        );
        Ok(())
    }

    async fn handle_left(
        &self,
        object: &MeetingObject,
        participant: &ParticipantObject,
    ) -> DaoResult<()> {
        let Some((meeting_id, _)) = self.lookup(&object.id).await? else {
            return Ok(());
        };
        let left_at = participant
            .leave_time
            .map(DateTime::from_chrono)
            .unwrap_or_else(DateTime::now);
        let closed = self
            .store
            .close_open_session(meeting_id, &participant.email, left_at)
            .await?;
        if !closed {
            warn!(
                provider_meeting_id = %object.id,
                email = %participant.email,
                "Discarding leave event without a matching join"
            );
        }
        Ok(())
    }

    /// Finalizes a meeting: claims the marker, persists the end, reconciles
    /// raw sessions into per-user attendance, flips `attended` flags, and
    /// fans out post-meeting surveys.
    async fn handle_ended(&self, object: &MeetingObject) -> DaoResult<()> {
        let Some((meeting_id, meeting)) = self.lookup(&object.id).await? else {
            return Ok(());
        };

        let _guard = self.locks.acquire(&object.id).await;

        // Claim before doing any work. A replayed `ended` must not re-run
        // reconciliation or re-send surveys.
        if !self.store.claim_finalize(meeting_id).await? {
            info!(provider_meeting_id = %object.id, "Meeting already finalized, skipping");
            return Ok(());
        }

        let ended_at = object
            .end_time
            .map(DateTime::from_chrono)
            .unwrap_or_else(DateTime::now);
        self.store.mark_ended(meeting_id, ended_at).await?;

        let start = meeting.effective_start().to_chrono();
        let rows = self.store.list_sessions(meeting_id).await?;
        let events: Vec<ParticipantEvent> = rows
            .iter()
            .map(|r| ParticipantEvent {
                key: r.participant_email.clone(),
                join: r.joined_at.to_chrono(),
                leave: r.left_at.map(|t| t.to_chrono()),
            })
            .collect();
        let reconciled = reconcile(start, ended_at.to_chrono(), &events);

        let engagements = self.store.list_engagements(meeting_id).await?;
        let mut attendee_ids: Vec<ObjectId> = Vec::new();
        for engagement in &engagements {
            if reconciled.contains_key(&engagement.user_email) {
                self.store
                    .mark_attended(meeting_id, engagement.user_id)
                    .await?;
                attendee_ids.push(engagement.user_id);
            }
        }

        let attendees = self.store.find_users_by_ids(&attendee_ids).await?;
        let report = self
            .dispatcher
            .dispatch_surveys(&meeting_ref(&meeting, meeting_id), &recipients(&attendees))
            .await;
        info!(
            provider_meeting_id = %object.id,
            participants = reconciled.len(),
            attendees = attendee_ids.len(),
            surveys_sent = report.sent.len(),
            "Meeting finalized"
        );
        Ok(())
    }

    async fn handle_recording(&self, object: &RecordingObject) -> DaoResult<()> {
        let Some((meeting_id, meeting)) = self.lookup(&object.id).await? else {
            return Ok(());
        };
        self.store
            .set_recording(meeting_id, &object.share_url, object.password.as_deref())
            .await?;

        let engagements = self.store.list_engagements(meeting_id).await?;
        let absent_ids: Vec<ObjectId> = engagements
            .iter()
            .filter(|e| !e.attended)
            .map(|e| e.user_id)
            .collect();
        let absentees = self.store.find_users_by_ids(&absent_ids).await?;
        let report = self
            .dispatcher
            .dispatch_missed(
                &meeting_ref(&meeting, meeting_id),
                &recipients(&absentees),
                &object.share_url,
            )
            .await;
        info!(
            provider_meeting_id = %object.id,
            absentees = absent_ids.len(),
            sent = report.sent.len(),
            "Recording stored"
        );
        Ok(())
    }

    /// Resolves a provider meeting id to our record. Unknown meetings are
    /// logged and dropped so the webhook ingress can still acknowledge.
    async fn lookup(&self, provider_meeting_id: &str) -> DaoResult<Option<(ObjectId, Meeting)>> {
        match self.store.find_meeting(provider_meeting_id).await? {
            Some(meeting) => match meeting.id {
                Some(id) => Ok(Some((id, meeting))),
                None => Ok(None),
            },
            None => {
                warn!(provider_meeting_id = %provider_meeting_id, "Event for unknown meeting dropped");
                Ok(None)
            }
        }
    }
}

fn meeting_ref(meeting: &Meeting, meeting_id: ObjectId) -> MeetingRef {
    MeetingRef {
        id: meeting_id.to_hex(),
        provider_meeting_id: meeting.provider_meeting_id.clone(),
        topic: meeting.topic.clone(),
        suppress_outreach: meeting.suppress_outreach,
    }
}

fn recipients(users: &[User]) -> Vec<Recipient> {
    users
        .iter()
        .filter_map(|u| {
            u.id.map(|id| Recipient {
                user_id: id.to_hex(),
                name: u.name.clone(),
                phone: u.phone.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use meetloop_db::models::{Engagement, Interested, UserRole};

    use crate::messaging::{Messenger, MessagingError, OutboundMessage};

    use super::*;

    struct FakeState {
        meeting: Meeting,
        sessions: Vec<AttendanceRecord>,
        engagements: Vec<Engagement>,
        users: Vec<User>,
    }

    struct FakeStore {
        state: Mutex<FakeState>,
    }

    impl FakeStore {
        fn new(meeting: Meeting) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(FakeState {
                    meeting,
                    sessions: Vec::new(),
                    engagements: Vec::new(),
                    users: Vec::new(),
                }),
            })
        }
    }

    #[async_trait]
    impl LifecycleStore for FakeStore {
        async fn find_meeting(&self, provider_meeting_id: &str) -> DaoResult<Option<Meeting>> {
            let state = self.state.lock().unwrap();
            if state.meeting.provider_meeting_id == provider_meeting_id {
                Ok(Some(state.meeting.clone()))
            } else {
                Ok(None)
            }
        }

        async fn mark_started(&self, _meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            if state.meeting.actual_start_date.is_some() {
                return Ok(false);
            }
            state.meeting.actual_start_date = Some(at);
            Ok(true)
        }

        async fn claim_finalize(&self, _meeting_id: ObjectId) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            if state.meeting.notified_at.is_some() {
                return Ok(false);
            }
            state.meeting.notified_at = Some(DateTime::now());
            Ok(true)
        }

        async fn mark_ended(&self, _meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            state.meeting.actual_end_date = Some(at);
            Ok(true)
        }

        async fn set_recording(
            &self,
            _meeting_id: ObjectId,
            link: &str,
            passcode: Option<&str>,
        ) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            state.meeting.recording_link = Some(link.to_string());
            state.meeting.recording_passcode = passcode.map(String::from);
            Ok(true)
        }

        async fn open_session(&self, record: &AttendanceRecord) -> DaoResult<ObjectId> {
            let mut state = self.state.lock().unwrap();
            let id = ObjectId::new();
            let mut stored = record.clone();
            stored.id = Some(id);
            state.sessions.push(stored);
            Ok(id)
        }

        async fn close_open_session(
            &self,
            _meeting_id: ObjectId,
            participant_email: &str,
            left_at: DateTime,
        ) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            let open = state
                .sessions
                .iter_mut()
                .filter(|s| s.participant_email == participant_email && s.left_at.is_none())
                .max_by_key(|s| s.joined_at);
            match open {
                Some(session) => {
                    session.left_at = Some(left_at);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn list_sessions(&self, _meeting_id: ObjectId) -> DaoResult<Vec<AttendanceRecord>> {
            Ok(self.state.lock().unwrap().sessions.clone())
        }

        async fn list_engagements(&self, _meeting_id: ObjectId) -> DaoResult<Vec<Engagement>> {
            Ok(self.state.lock().unwrap().engagements.clone())
        }

        async fn mark_attended(&self, _meeting_id: ObjectId, user_id: ObjectId) -> DaoResult<bool> {
            let mut state = self.state.lock().unwrap();
            for engagement in &mut state.engagements {
                if engagement.user_id == user_id {
                    engagement.attended = true;
                    return Ok(true);
                }
            }
            Ok(false)
        }

        async fn find_user_by_email(&self, email: &str) -> DaoResult<Option<User>> {
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| u.email == email).cloned())
        }

        async fn find_users_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<User>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .users
                .iter()
                .filter(|u| u.id.is_some_and(|id| ids.contains(&id)))
                .cloned()
                .collect())
        }
    }

    struct CountingMessenger {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl CountingMessenger {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Messenger for CountingMessenger {
        async fn send_template(
            &self,
            message: &OutboundMessage,
        ) -> Result<String, MessagingError> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(format!("wamid.{}", message.dedup_key))
        }
    }

    const PROVIDER_ID: &str = "987654";

    fn meeting_fixture() -> Meeting {
        let now = DateTime::now();
        Meeting {
            id: Some(ObjectId::new()),
            provider_meeting_id: PROVIDER_ID.into(),
            topic: "Weekly Standup".into(),
            creator_id: ObjectId::new(),
            join_url: "https://example.com/j/987654".into(),
            start_date: DateTime::from_chrono(Utc::now() - Duration::minutes(45)),
            scheduled_end_date: None,
            actual_start_date: None,
            actual_end_date: None,
            recording_link: None,
            recording_passcode: None,
            invite_sent_at: None,
            notified_at: None,
            suppress_outreach: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn user_fixture(email: &str) -> User {
        let now = DateTime::now();
        User {
            id: Some(ObjectId::new()),
            email: email.into(),
            name: "Ivan Petrov".into(),
            phone: Some("15550002222".into()),
            role: UserRole::Member,
            creator_id: Some(ObjectId::new()),
            created_at: now,
            updated_at: now,
        }
    }

    fn engagement_fixture(meeting_id: ObjectId, user: &User) -> Engagement {
        let now = DateTime::now();
        Engagement {
            id: Some(ObjectId::new()),
            meeting_id,
            user_id: user.id.unwrap(),
            user_email: user.email.clone(),
            interested: Interested::Yes,
            attended: false,
            satisfaction_rating: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(store: Arc<FakeStore>) -> (LifecycleService, Arc<CountingMessenger>) {
        let messenger = CountingMessenger::new();
        let dispatcher = Arc::new(Dispatcher::new(messenger.clone(), "15550001111".into()));
        (LifecycleService::new(store, dispatcher), messenger)
    }

    fn meeting_object() -> MeetingObject {
        MeetingObject {
            id: PROVIDER_ID.into(),
            uuid: None,
            host_id: None,
            topic: None,
            start_time: Some(Utc::now() - Duration::minutes(40)),
            end_time: Some(Utc::now()),
        }
    }

    fn participant(email: &str) -> ParticipantObject {
        ParticipantObject {
            id: None,
            user_name: Some("Ivan".into()),
            email: email.into(),
            join_time: Some(Utc::now() - Duration::minutes(35)),
            leave_time: Some(Utc::now() - Duration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn replayed_ended_event_finalizes_once() {
        let meeting = meeting_fixture();
        let meeting_id = meeting.id.unwrap();
        let store = FakeStore::new(meeting);
        let user = user_fixture("ivan@example.com");
        {
            let mut state = store.state.lock().unwrap();
            let engagement = engagement_fixture(meeting_id, &user);
            state.users.push(user);
            state.engagements.push(engagement);
        }
        let (service, messenger) = service(store.clone());

        let email = "ivan@example.com";
        service
            .handle_event(LifecycleEvent::ParticipantJoined {
                object: meeting_object(),
                participant: participant(email),
            })
            .await
            .unwrap();
        service
            .handle_event(LifecycleEvent::ParticipantLeft {
                object: meeting_object(),
                participant: participant(email),
            })
            .await
            .unwrap();

        service
            .handle_event(LifecycleEvent::MeetingEnded {
                object: meeting_object(),
            })
            .await
            .unwrap();
        assert_eq!(messenger.sent.lock().unwrap().len(), 1);
        assert!(store.state.lock().unwrap().engagements[0].attended);

        // The provider retries delivery; the replay must not send again.
        service
            .handle_event(LifecycleEvent::MeetingEnded {
                object: meeting_object(),
            })
            .await
            .unwrap();
        assert_eq!(messenger.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leave_without_matching_join_is_discarded() {
        let store = FakeStore::new(meeting_fixture());
        let (service, _) = service(store.clone());

        service
            .handle_event(LifecycleEvent::ParticipantLeft {
                object: meeting_object(),
                participant: participant("ghost@example.com"),
            })
            .await
            .unwrap();

        let state = store.state.lock().unwrap();
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn replayed_started_event_keeps_first_timestamp() {
        let store = FakeStore::new(meeting_fixture());
        let (service, _) = service(store.clone());

        let first = meeting_object();
        service
            .handle_event(LifecycleEvent::MeetingStarted {
                object: first.clone(),
            })
            .await
            .unwrap();
        let recorded = store.state.lock().unwrap().meeting.actual_start_date;

        let mut replay = meeting_object();
        replay.start_time = Some(Utc::now());
        service
            .handle_event(LifecycleEvent::MeetingStarted { object: replay })
            .await
            .unwrap();

        let state = store.state.lock().unwrap();
        assert_eq!(state.meeting.actual_start_date, recorded);
    }

    #[tokio::test]
    async fn events_for_unknown_meetings_are_dropped() {
        let store = FakeStore::new(meeting_fixture());
        let (service, messenger) = service(store.clone());

        let mut object = meeting_object();
        object.id = "000000".into();
        service
            .handle_event(LifecycleEvent::MeetingEnded { object })
            .await
            .unwrap();

        let state = store.state.lock().unwrap();
        assert!(state.meeting.notified_at.is_none());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }
}
