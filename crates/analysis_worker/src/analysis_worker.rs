use crate::domain::{
    AlertDispatcher, CheckinMonitor, GeofenceEvaluator, PlatformAlertDispatcher, UsageMeter,
};
use crate::handlers::{
    CheckinHandler, DeviceParamEditHandler, GeofenceHandler, CHECKIN_ROUTE, CHECKIN_TICK_VARIABLE,
    DEVICE_PARAMS_EDIT_ROUTE, GEOFENCE_ROUTE, LOCATION_VARIABLE,
};
use crate::router::{AnalysisRouter, Predicate, RouterOutcome, WidgetAction};
use common::domain::{
    ActionRepository, AnalysisInvocation, DeviceRepository, DomainResult, InMemoryPlatform,
    NotificationService, ServiceQuota, UsageChannel, UserRepository,
};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct AnalysisWorkerConfig {
    pub default_alert_channels: Vec<UsageChannel>,
    pub geofence_zone_qty: u32,
    pub device_params_widget_id: String,
}

impl Default for AnalysisWorkerConfig {
    fn default() -> Self {
        Self {
            default_alert_channels: vec![UsageChannel::Notification],
            geofence_zone_qty: 1000,
            device_params_widget_id: "device_params".to_string(),
        }
    }
}

/// Platform collaborators shared by every service
#[derive(Clone)]
pub struct PlatformDependencies {
    pub devices: Arc<dyn DeviceRepository>,
    pub actions: Arc<dyn ActionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifications: Arc<dyn NotificationService>,
    pub quota: Arc<dyn ServiceQuota>,
}

impl PlatformDependencies {
    /// Every collaborator backed by one in-memory platform
    pub fn in_memory(platform: Arc<InMemoryPlatform>) -> Self {
        Self {
            devices: platform.clone(),
            actions: platform.clone(),
            users: platform.clone(),
            notifications: platform.clone(),
            quota: platform,
        }
    }
}

pub struct AnalysisWorker {
    router: AnalysisRouter,
}

impl AnalysisWorker {
    pub fn new(deps: PlatformDependencies, config: AnalysisWorkerConfig) -> Self {
        info!("Initializing analysis worker");

        let meter = Arc::new(UsageMeter::new(
            deps.devices.clone(),
            deps.users.clone(),
            deps.notifications.clone(),
            deps.quota.clone(),
        ));
        let dispatcher: Arc<dyn AlertDispatcher> = Arc::new(PlatformAlertDispatcher::new(
            deps.devices.clone(),
            deps.users.clone(),
            deps.notifications.clone(),
            meter,
        ));
        let evaluator = Arc::new(GeofenceEvaluator::new(
            deps.devices.clone(),
            deps.actions.clone(),
            dispatcher.clone(),
            config.default_alert_channels.clone(),
            config.geofence_zone_qty,
        ));
        let monitor = Arc::new(CheckinMonitor::new(
            deps.devices.clone(),
            dispatcher,
            config.default_alert_channels,
        ));

        let mut router = AnalysisRouter::new();
        router.register(
            GEOFENCE_ROUTE,
            Arc::new(GeofenceHandler::new(evaluator)),
            vec![Predicate::Variables(vec![LOCATION_VARIABLE.to_string()])],
        );
        router.register(
            CHECKIN_ROUTE,
            Arc::new(CheckinHandler::new(deps.devices.clone(), monitor)),
            vec![Predicate::Variables(vec![CHECKIN_TICK_VARIABLE.to_string()])],
        );
        router
            .register(
                DEVICE_PARAMS_EDIT_ROUTE,
                Arc::new(DeviceParamEditHandler::new(deps.devices)),
                vec![],
            )
            .when_device_list(config.device_params_widget_id)
            .when_widget_exec(WidgetAction::Edit);

        info!(routes = ?router.route_names(), "analysis worker initialized");
        Self { router }
    }

    pub fn router(&self) -> &AnalysisRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut AnalysisRouter {
        &mut self.router
    }

    /// Route one invocation's batch to every matching handler
    #[instrument(skip(self, invocation), fields(records = invocation.data.len()))]
    pub async fn run(&self, invocation: &AnalysisInvocation) -> DomainResult<RouterOutcome> {
        self.router
            .exec(&invocation.data, &invocation.environment)
            .await
    }
}
