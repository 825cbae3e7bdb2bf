//! The demo hotel: users, rooms and concierge services loaded once at
//! startup and applied to an empty engine.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::{Money, RoomType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Staff,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoUser {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRoom {
    pub id: Ulid,
    pub number: String,
    pub room_type: RoomType,
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedService {
    pub id: Ulid,
    pub name: String,
    pub price: Money,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

/// Read-only after load. Users with the guest role become registered guests;
/// staff and admins only live here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<DemoUser>,
    #[serde(default)]
    pub rooms: Vec<SeedRoom>,
    #[serde(default)]
    pub services: Vec<SeedService>,
}

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(e) => write!(f, "cannot read dataset: {e}"),
            SeedError::Parse(e) => write!(f, "malformed dataset: {e}"),
            SeedError::Invalid(msg) => write!(f, "invalid dataset: {msg}"),
        }
    }
}

impl std::error::Error for SeedError {}

impl From<std::io::Error> for SeedError {
    fn from(e: std::io::Error) -> Self {
        SeedError::Io(e)
    }
}

impl From<serde_json::Error> for SeedError {
    fn from(e: serde_json::Error) -> Self {
        SeedError::Parse(e)
    }
}

/// Stable ids so the demo hotel looks the same after every restart.
fn fixed_id(n: u128) -> Ulid {
    Ulid::from_parts(0, n)
}

impl Dataset {
    pub fn builtin() -> Self {
        let user = |n, name: &str, email: &str, role| DemoUser {
            id: fixed_id(n),
            name: name.into(),
            email: email.into(),
            role,
        };
        let room = |n, number: &str, room_type, capacity| SeedRoom {
            id: fixed_id(n),
            number: number.into(),
            room_type,
            capacity,
        };
        let service = |n, name: &str, price| SeedService {
            id: fixed_id(n),
            name: name.into(),
            price: Money::new(price).unwrap_or(Money::ZERO),
            available: true,
        };
        Self {
            users: vec![
                user(1, "Ada Lovelace", "ada@example.com", Role::Guest),
                user(2, "Grace Hopper", "grace@example.com", Role::Guest),
                user(3, "Front Desk", "desk@staybook.local", Role::Staff),
                user(4, "Hotel Admin", "admin@staybook.local", Role::Admin),
            ],
            rooms: vec![
                room(101, "101", RoomType::Standard, 2),
                room(102, "102", RoomType::Standard, 2),
                room(201, "201", RoomType::Deluxe, 3),
                room(202, "202", RoomType::Deluxe, 3),
                room(301, "301", RoomType::Suite, 4),
            ],
            services: vec![
                service(1001, "Spa treatment", dec!(80)),
                service(1002, "Airport transfer", dec!(60)),
                service(1003, "Private dinner", dec!(150)),
            ],
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// The file when given, the built-in hotel otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, SeedError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    fn validate(&self) -> Result<(), SeedError> {
        let mut emails = HashSet::new();
        for u in &self.users {
            if !emails.insert(u.email.to_ascii_lowercase()) {
                return Err(SeedError::Invalid(format!("duplicate email {}", u.email)));
            }
        }
        let mut numbers = HashSet::new();
        for r in &self.rooms {
            if !numbers.insert(r.number.as_str()) {
                return Err(SeedError::Invalid(format!("duplicate room number {}", r.number)));
            }
        }
        Ok(())
    }

    pub fn user_by_email(&self, email: &str) -> Option<&DemoUser> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email.trim()))
    }

    pub fn guests(&self) -> impl Iterator<Item = &DemoUser> {
        self.users.iter().filter(|u| u.role == Role::Guest)
    }

    /// Load into `engine` if it holds no rooms yet. Returns whether anything
    /// was written; a replayed journal wins over the dataset.
    pub async fn apply(&self, engine: &Engine) -> Result<bool, EngineError> {
        if engine.room_count() > 0 {
            return Ok(false);
        }
        for room in &self.rooms {
            engine
                .add_room(room.id, room.number.clone(), room.room_type, room.capacity)
                .await?;
        }
        for user in self.guests() {
            if engine.find_guest_by_email(&user.email).is_none() {
                engine
                    .register_guest(user.id, user.name.clone(), user.email.clone())
                    .await?;
            }
        }
        for service in &self.services {
            engine
                .list_concierge_service(service.id, service.name.clone(), service.price, service.available)
                .await?;
        }
        info!(
            rooms = self.rooms.len(),
            guests = self.guests().count(),
            services = self.services.len(),
            "demo dataset loaded"
        );
        Ok(true)
    }
}
