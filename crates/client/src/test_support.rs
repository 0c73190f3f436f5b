//! Shared test doubles for the client aggregates.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use pizza_time_core::{
    AuthResponse, ChatReply, ChatRequest, Contact, ContactId, ContactPatch, Credentials,
    EpochMillis, NewContact, NewOrder, Order, OrderId, OrderPatch, PublicUser, UserId,
};

use crate::api::{Remote, SupportEmail};
use crate::error::{ClientError, Result, StorageError};
use crate::storage::{MemoryStorage, Storage};

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn at_millis(millis: i64) -> Arc<Self> {
        let now = match Utc.timestamp_millis_opt(millis).single() {
            Some(now) => now,
            None => panic!("timestamp out of range: {millis}"),
        };
        Arc::new(Self(Mutex::new(now)))
    }

    pub fn advance_minutes(&self, minutes: i64) {
        *self.lock_clock() += TimeDelta::minutes(minutes);
    }

    pub fn now(&self) -> EpochMillis {
        EpochMillis::from_datetime(self.utc())
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

fn unavailable() -> ClientError {
    ClientError::Api {
        status: 503,
        message: "Service is temporarily unavailable. Please try again later.".to_owned(),
    }
}

#[derive(Default)]
struct FakeState {
    orders: Vec<Order>,
    contacts: Vec<Contact>,
    chat_requests: Vec<ChatRequest>,
    emails: Vec<SupportEmail>,
    users: Vec<(Credentials, PublicUser)>,
    signed_in: Option<PublicUser>,
}

/// In-memory gateway. Starts online; [`FakeRemote::set_online`] flips it.
pub struct FakeRemote {
    online: AtomicBool,
    /// Successful order creations allowed before the gateway starts failing.
    create_budget: AtomicUsize,
    state: Mutex<FakeState>,
}

impl FakeRemote {
    pub fn online() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            create_budget: AtomicUsize::new(usize::MAX),
            state: Mutex::new(FakeState::default()),
        })
    }

    pub fn offline() -> Arc<Self> {
        let remote = Self::online();
        remote.set_online(false);
        remote
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn fail_creates_after(&self, successes: usize) {
        self.create_budget.store(successes, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.state().contacts.clone()
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.state().chat_requests.clone()
    }

    pub fn emails(&self) -> Vec<SupportEmail> {
        self.state().emails.clone()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("fake remote mutex"),
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(unavailable())
        }
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn register(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.check_online()?;
        let mut state = self.state();
        if state
            .users
            .iter()
            .any(|(c, _)| c.username.eq_ignore_ascii_case(&credentials.username))
        {
            return Err(ClientError::Api {
                status: 409,
                message: "Username already exists".to_owned(),
            });
        }
        let user = PublicUser {
            id: UserId::generate(),
            username: credentials.username.to_lowercase(),
            email: credentials.email.clone(),
            created_at: Utc::now(),
        };
        state.users.push((credentials.clone(), user.clone()));
        state.signed_in = Some(user.clone());
        Ok(AuthResponse {
            success: true,
            token: Some(format!("token-{}", user.id)),
            user,
        })
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        self.check_online()?;
        let mut state = self.state();
        let user = state
            .users
            .iter()
            .find(|(c, _)| {
                c.username.eq_ignore_ascii_case(&credentials.username)
                    && c.password == credentials.password
            })
            .map(|(_, user)| user.clone())
            .ok_or_else(|| ClientError::Api {
                status: 401,
                message: "Invalid username or password".to_owned(),
            })?;
        state.signed_in = Some(user.clone());
        Ok(AuthResponse {
            success: true,
            token: Some(format!("token-{}", user.id)),
            user,
        })
    }

    async fn current_user(&self) -> Result<PublicUser> {
        self.check_online()?;
        self.state().signed_in.clone().ok_or(ClientError::Api {
            status: 401,
            message: "Access token required".to_owned(),
        })
    }

    async fn delete_account(&self, password: &str) -> Result<()> {
        self.check_online()?;
        let mut state = self.state();
        let Some(user) = state.signed_in.clone() else {
            return Err(ClientError::Api {
                status: 401,
                message: "Access token required".to_owned(),
            });
        };
        if !state
            .users
            .iter()
            .any(|(c, u)| u.id == user.id && c.password == password)
        {
            return Err(ClientError::Api {
                status: 401,
                message: "Invalid password".to_owned(),
            });
        }
        state.users.retain(|(_, u)| u.id != user.id);
        state.orders.clear();
        state.contacts.clear();
        state.signed_in = None;
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.check_online()?;
        Ok(self.orders())
    }

    async fn create_order(&self, order: &NewOrder) -> Result<Order> {
        self.check_online()?;
        let budget = self.create_budget.load(Ordering::SeqCst);
        if budget == 0 {
            return Err(unavailable());
        }
        self.create_budget.store(budget.saturating_sub(1), Ordering::SeqCst);
        let order = order
            .clone()
            .into_order(OrderId::generate(), None, EpochMillis::now());
        self.state().orders.push(order.clone());
        Ok(order)
    }

    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<Order> {
        self.check_online()?;
        let mut state = self.state();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Order not found".to_owned(),
            })?;
        let mut next = order.clone();
        let placed_at = next.placed_at;
        patch
            .clone()
            .apply(&mut next, placed_at)
            .map_err(|e| ClientError::Api {
                status: 409,
                message: e.to_string(),
            })?;
        *order = next.clone();
        Ok(next)
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>> {
        self.check_online()?;
        Ok(self.contacts())
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact> {
        self.check_online()?;
        let contact = contact.clone().into_contact(ContactId::generate(), None);
        self.state().contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update_contact(&self, id: &ContactId, patch: &ContactPatch) -> Result<Contact> {
        self.check_online()?;
        let mut state = self.state();
        let contact = state
            .contacts
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ClientError::Api {
                status: 404,
                message: "Contact not found".to_owned(),
            })?;
        patch.clone().apply(contact);
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: &ContactId) -> Result<()> {
        self.check_online()?;
        let mut state = self.state();
        let before = state.contacts.len();
        state.contacts.retain(|c| &c.id != id);
        if state.contacts.len() == before {
            return Err(ClientError::Api {
                status: 404,
                message: "Contact not found".to_owned(),
            });
        }
        Ok(())
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        self.check_online()?;
        self.state().chat_requests.push(request.clone());
        Ok(ChatReply {
            message: format!("You said: {}", request.message),
        })
    }

    async fn send_support_email(&self, email: &SupportEmail) -> Result<()> {
        self.check_online()?;
        self.state().emails.push(email.clone());
        Ok(())
    }
}

/// Storage that accepts a fixed number of writes, then fails every write.
pub struct FlakyStorage {
    inner: MemoryStorage,
    writes_left: AtomicUsize,
}

impl FlakyStorage {
    pub fn failing_after(writes: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStorage::new(),
            writes_left: AtomicUsize::new(writes),
        })
    }
}

impl Storage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.writes_left.store(left - 1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
