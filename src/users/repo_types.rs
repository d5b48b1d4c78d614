use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::time_fmt::iso_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Invited,
    Active,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Profile pictures. Always tagged; legacy bare strings and arrays are
/// normalized by the `0004` migration and never accepted at the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileImages {
    #[default]
    None,
    Single { url: String },
    Gallery { urls: Vec<String> },
}

pub const MAX_GALLERY_IMAGES: usize = 6;

impl ProfileImages {
    pub fn is_empty(&self) -> bool {
        matches!(self, ProfileImages::None)
    }

    pub fn primary(&self) -> Option<&str> {
        match self {
            ProfileImages::None => None,
            ProfileImages::Single { url } => Some(url),
            ProfileImages::Gallery { urls } => urls.first().map(String::as_str),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            ProfileImages::None => Ok(()),
            ProfileImages::Single { url } if url.trim().is_empty() => {
                Err("image url must not be empty".into())
            }
            ProfileImages::Single { .. } => Ok(()),
            ProfileImages::Gallery { urls } if urls.is_empty() => {
                Err("gallery must contain at least one image".into())
            }
            ProfileImages::Gallery { urls } if urls.len() > MAX_GALLERY_IMAGES => Err(format!(
                "gallery holds at most {MAX_GALLERY_IMAGES} images"
            )),
            ProfileImages::Gallery { urls } if urls.iter().any(|u| u.trim().is_empty()) => {
                Err("image url must not be empty".into())
            }
            ProfileImages::Gallery { .. } => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default, with = "iso_date::option")]
    pub date_of_birth: Option<Date>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub images: ProfileImages,
    /// 0..=100, always computed server-side.
    #[serde(default)]
    pub completeness: u8,
}

impl Profile {
    pub fn age_on(&self, today: Date) -> Option<i32> {
        let dob = self.date_of_birth?;
        let mut age = today.year() - dob.year();
        if (today.month() as u8, today.day()) < (dob.month() as u8, dob.day()) {
            age -= 1;
        }
        Some(age)
    }
}

/// User as the rest of the service sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub approved: bool,
    pub profile: Profile,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw `users` row; enum columns are TEXT with CHECK constraints.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub status: String,
    pub approved: bool,
    pub profile: Json<Profile>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            role: r.role.parse()?,
            status: r.status.parse()?,
            approved: r.approved,
            profile: r.profile.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(anyhow::anyhow!("unknown {} {:?}", stringify!($ty), other)),
                }
            }
        }
    };
}

text_enum!(Role { User => "user", Admin => "admin" });
text_enum!(UserStatus { Invited => "invited", Active => "active", Paused => "paused" });
