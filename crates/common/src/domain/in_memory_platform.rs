use crate::domain::{
    ActionInfo, ActionRepository, DeviceDataQuery, DeviceInfo, DeviceRepository, DomainError,
    DomainResult, EmailMessage, EventRecord, KeyValueEntry, Notification, NotificationService,
    ServiceQuota, SmsMessage, Tag, UsageChannel, UserFilter, UserInfo, UserRepository,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// A message handed to `InMemoryPlatform`'s delivery methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Notification {
        user_id: String,
        notification: Notification,
    },
    Email(EmailMessage),
    Sms(SmsMessage),
}

#[derive(Default)]
struct PlatformState {
    devices: HashMap<String, DeviceInfo>,
    params: HashMap<String, Vec<KeyValueEntry>>,
    data: HashMap<String, Vec<EventRecord>>,
    actions: HashMap<String, ActionInfo>,
    users: Vec<UserInfo>,
    deliveries: Vec<Delivery>,
    exhausted: HashSet<UsageChannel>,
    param_writes: HashMap<String, usize>,
    next_param_id: u64,
}

/// In-memory implementation of every platform collaborator.
///
/// Params written without an id are assigned one, mirroring how the remote
/// store links parameters to records.
pub struct InMemoryPlatform {
    state: RwLock<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PlatformState::default()),
        }
    }

    pub async fn insert_device(&self, device: DeviceInfo) {
        let mut state = self.state.write().await;
        state.devices.insert(device.id.clone(), device);
    }

    pub async fn insert_params(&self, device_id: &str, entries: Vec<KeyValueEntry>) {
        let mut state = self.state.write().await;
        state.params.insert(device_id.to_string(), entries);
    }

    pub async fn insert_data(&self, device_id: &str, records: Vec<EventRecord>) {
        let mut state = self.state.write().await;
        state
            .data
            .entry(device_id.to_string())
            .or_default()
            .extend(records);
    }

    pub async fn insert_action(&self, action: ActionInfo) {
        let mut state = self.state.write().await;
        state.actions.insert(action.id.clone(), action);
    }

    pub async fn insert_user(&self, user: UserInfo) {
        let mut state = self.state.write().await;
        state.users.push(user);
    }

    pub async fn set_quota_exhausted(&self, channel: UsageChannel, exhausted: bool) {
        let mut state = self.state.write().await;
        if exhausted {
            state.exhausted.insert(channel);
        } else {
            state.exhausted.remove(&channel);
        }
    }

    pub async fn params(&self, device_id: &str) -> Vec<KeyValueEntry> {
        let state = self.state.read().await;
        state.params.get(device_id).cloned().unwrap_or_default()
    }

    pub async fn param(&self, device_id: &str, key: &str) -> Option<KeyValueEntry> {
        let state = self.state.read().await;
        state
            .params
            .get(device_id)
            .and_then(|entries| entries.iter().find(|e| e.key == key).cloned())
    }

    pub async fn data(&self, device_id: &str) -> Vec<EventRecord> {
        let state = self.state.read().await;
        state.data.get(device_id).cloned().unwrap_or_default()
    }

    pub async fn tags(&self, device_id: &str) -> Vec<Tag> {
        let state = self.state.read().await;
        state
            .devices
            .get(device_id)
            .map(|d| d.tags.clone())
            .unwrap_or_default()
    }

    /// Number of `set_params` calls made for a device
    pub async fn param_writes(&self, device_id: &str) -> usize {
        let state = self.state.read().await;
        state.param_writes.get(device_id).copied().unwrap_or(0)
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        let state = self.state.read().await;
        state.deliveries.clone()
    }
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryPlatform {
    async fn get_device_info(&self, device_id: &str) -> DomainResult<Option<DeviceInfo>> {
        let state = self.state.read().await;
        Ok(state.devices.get(device_id).cloned())
    }

    async fn list_params(&self, device_id: &str) -> DomainResult<Vec<KeyValueEntry>> {
        let state = self.state.read().await;
        Ok(state.params.get(device_id).cloned().unwrap_or_default())
    }

    async fn set_params(&self, device_id: &str, entries: Vec<KeyValueEntry>) -> DomainResult<()> {
        let mut state = self.state.write().await;
        *state.param_writes.entry(device_id.to_string()).or_default() += 1;

        let mut next_id = state.next_param_id;
        let stored = state.params.entry(device_id.to_string()).or_default();
        for mut entry in entries {
            match stored.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => {
                    entry.id = entry.id.or_else(|| existing.id.clone());
                    *existing = entry;
                }
                None => {
                    if entry.id.is_none() {
                        next_id += 1;
                        entry.id = Some(format!("param-{}", next_id));
                    }
                    stored.push(entry);
                }
            }
        }
        state.next_param_id = next_id;
        Ok(())
    }

    async fn set_tags(&self, device_id: &str, tags: Vec<Tag>) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let device = state
            .devices
            .get_mut(device_id)
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;
        device.tags = tags;
        Ok(())
    }

    async fn get_device_data(
        &self,
        device_id: &str,
        query: DeviceDataQuery,
    ) -> DomainResult<Vec<EventRecord>> {
        let state = self.state.read().await;
        if !state.devices.contains_key(device_id) {
            return Err(DomainError::DeviceNotFound(device_id.to_string()));
        }

        let records: Vec<EventRecord> = state
            .data
            .get(device_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| query.variables.is_empty() || query.variables.contains(&r.variable))
                    .filter(|r| {
                        query.groups.is_empty()
                            || r.group.as_ref().is_some_and(|g| query.groups.contains(g))
                    })
                    .take(if query.qty == 0 { usize::MAX } else { query.qty as usize })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn send_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state
            .data
            .entry(device_id.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    async fn edit_device_data(&self, device_id: &str, records: Vec<EventRecord>) -> DomainResult<()> {
        let mut state = self.state.write().await;
        let stored = state.data.entry(device_id.to_string()).or_default();
        for record in records {
            let target = stored
                .iter_mut()
                .find(|r| r.id.is_some() && r.id == record.id)
                .ok_or_else(|| {
                    DomainError::InvalidArgument(format!(
                        "record {:?} not found on device {}",
                        record.id, device_id
                    ))
                })?;
            *target = record;
        }
        Ok(())
    }
}

#[async_trait]
impl ActionRepository for InMemoryPlatform {
    async fn get_action_info(&self, action_id: &str) -> DomainResult<Option<ActionInfo>> {
        let state = self.state.read().await;
        Ok(state.actions.get(action_id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryPlatform {
    async fn list_users(&self, filter: UserFilter) -> DomainResult<Vec<UserInfo>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .filter(|u| filter.matches(u))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationService for InMemoryPlatform {
    async fn send_notification(&self, user_id: &str, notification: Notification) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.deliveries.push(Delivery::Notification {
            user_id: user_id.to_string(),
            notification,
        });
        Ok(())
    }

    async fn send_email(&self, email: EmailMessage) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.deliveries.push(Delivery::Email(email));
        Ok(())
    }

    async fn send_sms(&self, sms: SmsMessage) -> DomainResult<()> {
        let mut state = self.state.write().await;
        state.deliveries.push(Delivery::Sms(sms));
        Ok(())
    }
}

#[async_trait]
impl ServiceQuota for InMemoryPlatform {
    async fn is_exhausted(&self, channel: UsageChannel) -> DomainResult<bool> {
        let state = self.state.read().await;
        Ok(state.exhausted.contains(&channel))
    }
}
