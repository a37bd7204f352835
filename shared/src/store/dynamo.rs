//! Single-table DynamoDB layout.
//!
//! | item                 | PK                   | SK                         |
//! |----------------------|----------------------|----------------------------|
//! | user                 | `USER#{id}`          | `USER#{id}`                |
//! | login guard          | `LOGIN#{student_id}` | `LOGIN#{student_id}`       |
//! | email guard          | `EMAIL#{email}`      | `EMAIL#{email}`            |
//! | user -> profile link | `USER#{id}`          | `PROFILE`                  |
//! | profile              | `PROFILE#{id}`       | `PROFILE#{id}`             |
//! | achievement          | `ACHIEVEMENT#{id}`   | `ACHIEVEMENT#{id}`         |
//! | notification         | `USER#{owner}`       | `NOTIFICATION#{id:020}`    |
//! | id counter           | `COUNTER#{kind}`     | `COUNTER`                  |

use aws_sdk_dynamodb::types::{
    AttributeValue, ConditionCheck, Delete, Put, ReturnValue, TransactWriteItem,
};
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use super::{
    newest_first_achievements, newest_first_notifications, newest_first_profiles,
    AchievementCommit, Store, StoreError,
};
use crate::filters::AchievementFilter;
use crate::types::{
    Achievement, Cgpa, NewAchievement, NewUser, Notification, ProfileFields, Status,
    StudentProfile, User,
};

type Item = HashMap<String, AttributeValue>;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";
const TRANSACTION_LIMIT: usize = 100;
/// Updates only an existing notification; `UpdateItem` would otherwise upsert.
const MARK_READ_CONDITION: &str = "attribute_exists(PK)";

pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn next_id(&self, kind: &str) -> Result<u64, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(format!("COUNTER#{}", kind)))
            .key("SK", AttributeValue::S("COUNTER".to_string()))
            .update_expression("ADD seq :one")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(backend)?;

        result
            .attributes()
            .and_then(|attrs| attrs.get("seq"))
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| StoreError::Backend(format!("counter {} returned no value", kind)))
    }

    async fn get(&self, pk: String, sk: String) -> Result<Option<Item>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .send()
            .await
            .map_err(backend)?;
        Ok(result.item().cloned())
    }

    async fn scan_entities(
        &self,
        entity_type: &str,
        extra: FilterExpression,
    ) -> Result<Vec<Item>, StoreError> {
        let mut expr = FilterExpression::default();
        expr.push("entity_type", ":entity_type", AttributeValue::S(entity_type.to_string()));
        expr.extend(extra);

        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(expr.expression())
                .set_expression_attribute_names(Some(expr.names.clone()))
                .set_expression_attribute_values(Some(expr.values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend)?;
            items.extend(resp.items().iter().cloned());
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    async fn query_notifications(
        &self,
        user_id: u64,
        extra: FilterExpression,
    ) -> Result<Vec<Item>, StoreError> {
        let mut items = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut req = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(user_pk(user_id)))
                .expression_attribute_values(
                    ":sk_prefix",
                    AttributeValue::S("NOTIFICATION#".to_string()),
                )
                .scan_index_forward(false)
                .set_exclusive_start_key(start_key.take());
            if !extra.clauses.is_empty() {
                req = req.filter_expression(extra.expression());
                for (k, v) in &extra.names {
                    req = req.expression_attribute_names(k, v);
                }
                for (k, v) in &extra.values {
                    req = req.expression_attribute_values(k, v.clone());
                }
            }
            let resp = req.send().await.map_err(backend)?;
            items.extend(resp.items().iter().cloned());
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(items)
    }

    fn put(&self, item: Item, condition: &str) -> Result<TransactWriteItem, StoreError> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(condition)
            .build()
            .map_err(backend)?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn delete(&self, pk: String, sk: String) -> Result<TransactWriteItem, StoreError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk))
            .key("SK", AttributeValue::S(sk))
            .build()
            .map_err(backend)?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    /// Runs the transaction; on cancellation returns the index of the first
    /// item whose condition failed.
    async fn transact(&self, items: Vec<TransactWriteItem>) -> Result<Option<usize>, StoreError> {
        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(None),
            Err(e) => {
                let failed = e
                    .as_service_error()
                    .and_then(|service| match service {
                        aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError::TransactionCanceledException(c) => {
                            c.cancellation_reasons()
                                .iter()
                                .position(|r| r.code() == Some(CONDITIONAL_CHECK_FAILED))
                        }
                        _ => None,
                    });
                match failed {
                    Some(index) => Ok(Some(index)),
                    None => Err(backend(e)),
                }
            }
        }
    }
}

impl Store for DynamoStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let id = self.next_id("user").await?;
        let created = User {
            id,
            student_id: user.student_id,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: true,
            is_superuser: false,
            date_joined: Utc::now(),
        };

        let guard = |pk: String| -> Item {
            let mut item = Item::new();
            item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
            item.insert("SK".to_string(), AttributeValue::S(pk));
            item.insert("user_id".to_string(), AttributeValue::N(id.to_string()));
            item
        };
        let items = vec![
            self.put(user_item(&created), "attribute_not_exists(PK)")?,
            self.put(guard(login_pk(&created.student_id)), "attribute_not_exists(PK)")?,
            self.put(guard(email_pk(&created.email)), "attribute_not_exists(PK)")?,
        ];

        match self.transact(items).await? {
            None => {
                tracing::info!("User created: {} ({})", created.id, created.student_id);
                Ok(created)
            }
            Some(1) => Err(StoreError::Duplicate { field: "student_id" }),
            Some(2) => Err(StoreError::Duplicate { field: "email" }),
            Some(_) => Err(StoreError::Conflict(format!("User id {} already in use", id))),
        }
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>, StoreError> {
        let pk = user_pk(id);
        self.get(pk.clone(), pk)
            .await?
            .map(|item| user_from_item(&item))
            .transpose()
    }

    async fn find_user_by_login(&self, student_id: &str) -> Result<Option<User>, StoreError> {
        let pk = login_pk(student_id);
        let Some(guard) = self.get(pk.clone(), pk).await? else {
            return Ok(None);
        };
        self.get_user(n(&guard, "user_id")?).await
    }

    async fn create_profile(
        &self,
        user_id: u64,
        fields: ProfileFields,
    ) -> Result<StudentProfile, StoreError> {
        let id = self.next_id("profile").await?;
        let now = Utc::now();
        let mut profile = StudentProfile {
            id,
            user_id,
            profile_picture: None,
            bio: String::new(),
            department: String::new(),
            year: String::new(),
            cgpa: None,
            phone: String::new(),
            linkedin_url: String::new(),
            github_url: String::new(),
            created_at: now,
            updated_at: now,
        };
        profile.apply(fields);

        let owner = ConditionCheck::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(user_pk(user_id)))
            .key("SK", AttributeValue::S(user_pk(user_id)))
            .condition_expression("attribute_exists(PK)")
            .build()
            .map_err(backend)?;
        let mut link = Item::new();
        link.insert("PK".to_string(), AttributeValue::S(user_pk(user_id)));
        link.insert("SK".to_string(), AttributeValue::S("PROFILE".to_string()));
        link.insert("profile_id".to_string(), AttributeValue::N(id.to_string()));

        let items = vec![
            TransactWriteItem::builder().condition_check(owner).build(),
            self.put(link, "attribute_not_exists(PK)")?,
            self.put(profile_item(&profile), "attribute_not_exists(PK)")?,
        ];
        match self.transact(items).await? {
            None => Ok(profile),
            Some(0) => Err(StoreError::NotFound(format!("User {}", user_id))),
            Some(1) => Err(StoreError::Duplicate { field: "user" }),
            Some(_) => Err(StoreError::Conflict(format!("Profile id {} already in use", id))),
        }
    }

    async fn get_profile(&self, id: u64) -> Result<Option<StudentProfile>, StoreError> {
        let pk = profile_pk(id);
        self.get(pk.clone(), pk)
            .await?
            .map(|item| profile_from_item(&item))
            .transpose()
    }

    async fn get_profile_for_user(
        &self,
        user_id: u64,
    ) -> Result<Option<StudentProfile>, StoreError> {
        let Some(link) = self.get(user_pk(user_id), "PROFILE".to_string()).await? else {
            return Ok(None);
        };
        self.get_profile(n(&link, "profile_id")?).await
    }

    async fn list_profiles(&self) -> Result<Vec<StudentProfile>, StoreError> {
        let mut profiles = self
            .scan_entities("profile", FilterExpression::default())
            .await?
            .iter()
            .map(profile_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        newest_first_profiles(&mut profiles);
        Ok(profiles)
    }

    async fn save_profile(&self, profile: &StudentProfile) -> Result<(), StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(profile_item(profile)))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::NotFound(format!("Profile {}", profile.id)))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn create_achievement(
        &self,
        achievement: NewAchievement,
    ) -> Result<Achievement, StoreError> {
        let id = self.next_id("achievement").await?;
        let now = Utc::now();
        let created = Achievement {
            id,
            student: achievement.student,
            student_name: achievement.student_name,
            title: achievement.title,
            description: achievement.description,
            category: achievement.category,
            status: Status::Pending,
            proof_document: achievement.proof_document,
            achievement_date: achievement.achievement_date,
            verified_by: None,
            verified_by_name: None,
            verification_notes: String::new(),
            created_at: now,
            updated_at: now,
        };

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(achievement_item(&created)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(backend)?;
        Ok(created)
    }

    async fn get_achievement(&self, id: u64) -> Result<Option<Achievement>, StoreError> {
        let pk = achievement_pk(id);
        self.get(pk.clone(), pk)
            .await?
            .map(|item| achievement_from_item(&item))
            .transpose()
    }

    async fn list_achievements(
        &self,
        filter: &AchievementFilter,
    ) -> Result<Vec<Achievement>, StoreError> {
        let mut items = self
            .scan_entities("achievement", filter_expression(filter))
            .await?
            .iter()
            .map(achievement_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        newest_first_achievements(&mut items);
        Ok(items)
    }

    async fn commit_achievement(
        &self,
        commit: AchievementCommit,
    ) -> Result<Option<Notification>, StoreError> {
        let id = commit.achievement.id;
        let guarded = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(achievement_item(&commit.achievement)))
            .condition_expression("#status = :expected_status")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":expected_status",
                AttributeValue::S(commit.expected_status.to_string()),
            )
            .build()
            .map_err(backend)?;
        let mut items = vec![TransactWriteItem::builder().put(guarded).build()];

        let notification = match commit.notification {
            Some(n) => {
                let created = Notification {
                    id: self.next_id("notification").await?,
                    user: n.user,
                    achievement: n.achievement,
                    achievement_title: n.achievement_title,
                    message: n.message,
                    is_read: false,
                    created_at: Utc::now(),
                };
                items.push(self.put(notification_item(&created), "attribute_not_exists(PK)")?);
                Some(created)
            }
            None => None,
        };

        match self.transact(items).await? {
            None => Ok(notification),
            Some(_) => Err(StoreError::Conflict(format!(
                "Achievement {} changed status concurrently",
                id
            ))),
        }
    }

    async fn delete_achievement(&self, id: u64) -> Result<(), StoreError> {
        let achievement = self
            .get_achievement(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Achievement {}", id)))?;

        let mut linked = FilterExpression::default();
        linked.push("achievement", ":achievement", AttributeValue::N(id.to_string()));
        let notifications = self.query_notifications(achievement.student, linked).await?;

        let mut deletes = Vec::with_capacity(notifications.len() + 1);
        for item in &notifications {
            deletes.push(self.delete(user_pk(achievement.student), s(item, "SK"))?);
        }
        deletes.push(self.delete(achievement_pk(id), achievement_pk(id))?);

        // The achievement delete sits in the last chunk so it goes only once
        // its notifications are gone.
        let chunks: Vec<Vec<TransactWriteItem>> = deletes
            .chunks(TRANSACTION_LIMIT)
            .map(|c| c.to_vec())
            .collect();
        for chunk in chunks {
            if self.transact(chunk).await?.is_some() {
                return Err(StoreError::Conflict(format!(
                    "Achievement {} changed during delete",
                    id
                )));
            }
        }
        tracing::info!(
            "Achievement {} deleted with {} notifications",
            id,
            notifications.len()
        );
        Ok(())
    }

    async fn list_notifications(&self, user_id: u64) -> Result<Vec<Notification>, StoreError> {
        let mut items = self
            .query_notifications(user_id, FilterExpression::default())
            .await?
            .iter()
            .map(notification_from_item)
            .collect::<Result<Vec<_>, _>>()?;
        newest_first_notifications(&mut items);
        Ok(items)
    }

    async fn get_notification(
        &self,
        user_id: u64,
        id: u64,
    ) -> Result<Option<Notification>, StoreError> {
        self.get(user_pk(user_id), notification_sk(id))
            .await?
            .map(|item| notification_from_item(&item))
            .transpose()
    }

    async fn mark_notification_read(&self, user_id: u64, id: u64) -> Result<(), StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(user_pk(user_id)))
            .key("SK", AttributeValue::S(notification_sk(id)))
            .update_expression("SET is_read = :read")
            .condition_expression(MARK_READ_CONDITION)
            .expression_attribute_values(":read", AttributeValue::Bool(true))
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::NotFound(format!("Notification {}", id)))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: u64) -> Result<usize, StoreError> {
        let mut unread = FilterExpression::default();
        unread.push("is_read", ":unread", AttributeValue::Bool(false));
        let items = self.query_notifications(user_id, unread).await?;

        // A notification deleted since the query must not come back as a stub item.
        let mut flipped = 0;
        for item in &items {
            let result = self
                .client
                .update_item()
                .table_name(&self.table_name)
                .key("PK", AttributeValue::S(user_pk(user_id)))
                .key("SK", AttributeValue::S(s(item, "SK")))
                .update_expression("SET is_read = :read")
                .condition_expression(MARK_READ_CONDITION)
                .expression_attribute_values(":read", AttributeValue::Bool(true))
                .send()
                .await;
            match result {
                Ok(_) => flipped += 1,
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
                {
                    tracing::info!("Notification {} vanished before mark read", s(item, "SK"));
                }
                Err(e) => return Err(backend(e)),
            }
        }
        Ok(flipped)
    }
}

/// Equality clauses joined with AND, with placeholder names for every attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FilterExpression {
    clauses: Vec<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl FilterExpression {
    fn push(&mut self, attribute: &str, placeholder: &str, value: AttributeValue) {
        let name = format!("#{}", attribute);
        self.clauses.push(format!("{} = {}", name, placeholder));
        self.names.insert(name, attribute.to_string());
        self.values.insert(placeholder.to_string(), value);
    }

    fn extend(&mut self, other: FilterExpression) {
        self.clauses.extend(other.clauses);
        self.names.extend(other.names);
        self.values.extend(other.values);
    }

    fn expression(&self) -> String {
        self.clauses.join(" AND ")
    }
}

pub(crate) fn filter_expression(filter: &AchievementFilter) -> FilterExpression {
    let mut expr = FilterExpression::default();
    if let Some(student) = filter.student_id {
        expr.push("student", ":student", AttributeValue::N(student.to_string()));
    }
    if let Some(status) = filter.status {
        expr.push("status", ":status", AttributeValue::S(status.to_string()));
    }
    if let Some(category) = filter.category {
        expr.push("category", ":category", AttributeValue::S(category.to_string()));
    }
    expr
}

// ---- keys ----

fn user_pk(id: u64) -> String {
    format!("USER#{}", id)
}

fn login_pk(student_id: &str) -> String {
    format!("LOGIN#{}", student_id)
}

fn email_pk(email: &str) -> String {
    format!("EMAIL#{}", email)
}

fn profile_pk(id: u64) -> String {
    format!("PROFILE#{}", id)
}

fn achievement_pk(id: u64) -> String {
    format!("ACHIEVEMENT#{}", id)
}

/// Zero padded so the sort key orders by id.
fn notification_sk(id: u64) -> String {
    format!("NOTIFICATION#{:020}", id)
}

// ---- item mapping ----

fn backend<E: std::fmt::Debug>(e: E) -> StoreError {
    let detail = format!("{:?}", e);
    tracing::error!("DynamoDB request failed: {}", detail);
    StoreError::Backend(detail)
}

fn malformed(key: &str) -> StoreError {
    StoreError::Backend(format!("malformed item: bad or missing {}", key))
}

fn s(item: &Item, key: &str) -> String {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

fn opt_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).map(|s| s.to_string())
}

fn n(item: &Item, key: &str) -> Result<u64, StoreError> {
    opt_n(item, key).ok_or_else(|| malformed(key))
}

fn opt_n(item: &Item, key: &str) -> Option<u64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn b(item: &Item, key: &str) -> bool {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false)
}

fn parsed<T: FromStr>(item: &Item, key: &str) -> Result<T, StoreError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| malformed(key))
}

fn timestamp(item: &Item, key: &str) -> Result<DateTime<Utc>, StoreError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| malformed(key))
}

struct ItemBuilder(Item);

impl ItemBuilder {
    fn keyed(pk: String, sk: String, entity_type: &str) -> Self {
        let mut item = Item::new();
        item.insert("PK".to_string(), AttributeValue::S(pk));
        item.insert("SK".to_string(), AttributeValue::S(sk));
        item.insert(
            "entity_type".to_string(),
            AttributeValue::S(entity_type.to_string()),
        );
        Self(item)
    }

    fn s(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), AttributeValue::S(value.into()));
        self
    }

    fn opt_s(self, key: &str, value: Option<String>) -> Self {
        match value {
            Some(v) => self.s(key, v),
            None => self,
        }
    }

    fn n(mut self, key: &str, value: u64) -> Self {
        self.0.insert(key.to_string(), AttributeValue::N(value.to_string()));
        self
    }

    fn opt_n(self, key: &str, value: Option<u64>) -> Self {
        match value {
            Some(v) => self.n(key, v),
            None => self,
        }
    }

    fn b(mut self, key: &str, value: bool) -> Self {
        self.0.insert(key.to_string(), AttributeValue::Bool(value));
        self
    }

    fn build(self) -> Item {
        self.0
    }
}

fn user_item(u: &User) -> Item {
    ItemBuilder::keyed(user_pk(u.id), user_pk(u.id), "user")
        .n("user_id", u.id)
        .s("student_id", &u.student_id)
        .s("email", &u.email)
        .s("password_hash", &u.password_hash)
        .s("role", u.role.as_str())
        .s("first_name", &u.first_name)
        .s("last_name", &u.last_name)
        .b("is_active", u.is_active)
        .b("is_superuser", u.is_superuser)
        .s("date_joined", u.date_joined.to_rfc3339())
        .build()
}

fn user_from_item(item: &Item) -> Result<User, StoreError> {
    Ok(User {
        id: n(item, "user_id")?,
        student_id: s(item, "student_id"),
        email: s(item, "email"),
        password_hash: s(item, "password_hash"),
        role: parsed(item, "role")?,
        first_name: s(item, "first_name"),
        last_name: s(item, "last_name"),
        is_active: b(item, "is_active"),
        is_superuser: b(item, "is_superuser"),
        date_joined: timestamp(item, "date_joined")?,
    })
}

fn profile_item(p: &StudentProfile) -> Item {
    ItemBuilder::keyed(profile_pk(p.id), profile_pk(p.id), "profile")
        .n("profile_id", p.id)
        .n("user_id", p.user_id)
        .opt_s("profile_picture", p.profile_picture.clone())
        .s("bio", &p.bio)
        .s("department", &p.department)
        .s("year", &p.year)
        .opt_s("cgpa", p.cgpa.map(|c| c.to_string()))
        .s("phone", &p.phone)
        .s("linkedin_url", &p.linkedin_url)
        .s("github_url", &p.github_url)
        .s("created_at", p.created_at.to_rfc3339())
        .s("updated_at", p.updated_at.to_rfc3339())
        .build()
}

fn profile_from_item(item: &Item) -> Result<StudentProfile, StoreError> {
    let cgpa = match opt_s(item, "cgpa") {
        Some(raw) => Some(raw.parse::<Cgpa>().map_err(|_| malformed("cgpa"))?),
        None => None,
    };
    Ok(StudentProfile {
        id: n(item, "profile_id")?,
        user_id: n(item, "user_id")?,
        profile_picture: opt_s(item, "profile_picture"),
        bio: s(item, "bio"),
        department: s(item, "department"),
        year: s(item, "year"),
        cgpa,
        phone: s(item, "phone"),
        linkedin_url: s(item, "linkedin_url"),
        github_url: s(item, "github_url"),
        created_at: timestamp(item, "created_at")?,
        updated_at: timestamp(item, "updated_at")?,
    })
}

fn achievement_item(a: &Achievement) -> Item {
    ItemBuilder::keyed(achievement_pk(a.id), achievement_pk(a.id), "achievement")
        .n("achievement_id", a.id)
        .n("student", a.student)
        .s("student_name", &a.student_name)
        .s("title", &a.title)
        .s("description", &a.description)
        .s("category", a.category.as_str())
        .s("status", a.status.as_str())
        .opt_s("proof_document", a.proof_document.clone())
        .opt_s("achievement_date", a.achievement_date.map(|d| d.to_string()))
        .opt_n("verified_by", a.verified_by)
        .opt_s("verified_by_name", a.verified_by_name.clone())
        .s("verification_notes", &a.verification_notes)
        .s("created_at", a.created_at.to_rfc3339())
        .s("updated_at", a.updated_at.to_rfc3339())
        .build()
}

fn achievement_from_item(item: &Item) -> Result<Achievement, StoreError> {
    let achievement_date = match opt_s(item, "achievement_date") {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| malformed("achievement_date"))?,
        ),
        None => None,
    };
    Ok(Achievement {
        id: n(item, "achievement_id")?,
        student: n(item, "student")?,
        student_name: s(item, "student_name"),
        title: s(item, "title"),
        description: s(item, "description"),
        category: parsed(item, "category")?,
        status: parsed(item, "status")?,
        proof_document: opt_s(item, "proof_document"),
        achievement_date,
        verified_by: opt_n(item, "verified_by"),
        verified_by_name: opt_s(item, "verified_by_name"),
        verification_notes: s(item, "verification_notes"),
        created_at: timestamp(item, "created_at")?,
        updated_at: timestamp(item, "updated_at")?,
    })
}

fn notification_item(n: &Notification) -> Item {
    ItemBuilder::keyed(user_pk(n.user), notification_sk(n.id), "notification")
        .n("notification_id", n.id)
        .n("user", n.user)
        .n("achievement", n.achievement)
        .s("achievement_title", &n.achievement_title)
        .s("message", &n.message)
        .b("is_read", n.is_read)
        .s("created_at", n.created_at.to_rfc3339())
        .build()
}

fn notification_from_item(item: &Item) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: n(item, "notification_id")?,
        user: n(item, "user")?,
        achievement: n(item, "achievement")?,
        achievement_title: s(item, "achievement_title"),
        message: s(item, "message"),
        is_read: b(item, "is_read"),
        created_at: timestamp(item, "created_at")?,
    })
}
