use std::sync::Arc;

use mongodb::Database;

use meetloop_config::Settings;
use meetloop_services::{
    AnalyticsService, Dispatcher, InsightsService, LifecycleService, Messenger, WhatsAppMessenger,
    lifecycle::MongoLifecycleStore,
    dao::{
        attendance::AttendanceDao, engagement::EngagementDao, meeting::MeetingDao, user::UserDao,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub meetings: Arc<MeetingDao>,
    pub engagements: Arc<EngagementDao>,
    pub attendance: Arc<AttendanceDao>,
    pub users: Arc<UserDao>,
    pub messenger: Arc<dyn Messenger>,
    pub lifecycle: Arc<LifecycleService>,
    pub analytics: Arc<AnalyticsService>,
    pub insights: InsightsService,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        let meetings = Arc::new(MeetingDao::new(&db));
        let engagements = Arc::new(EngagementDao::new(&db));
        let attendance = Arc::new(AttendanceDao::new(&db));
        let users = Arc::new(UserDao::new(&db));

        let messenger: Arc<dyn Messenger> = Arc::new(WhatsAppMessenger::new(&settings.messaging));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&messenger),
            settings.messaging.cta_number.clone(),
        ));
        let store = Arc::new(MongoLifecycleStore::new(
            Arc::clone(&meetings),
            Arc::clone(&engagements),
            Arc::clone(&attendance),
            Arc::clone(&users),
        ));
        let lifecycle = Arc::new(LifecycleService::new(store, dispatcher));
        let analytics = Arc::new(AnalyticsService::new(
            Arc::clone(&meetings),
            Arc::clone(&engagements),
            Arc::clone(&attendance),
            Arc::clone(&users),
        ));
        let insights = InsightsService::new(&settings.insights);

        Self {
            db,
            settings,
            meetings,
            engagements,
            attendance,
            users,
            messenger,
            lifecycle,
            analytics,
            insights,
        }
    }
}
