use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{RepoError, RepoResult, Repository, constraints};
use crate::models::{
    Comment, ConfirmationState, NewComment, NewReview, NewTitle, NewUser, Review, TaxonomyEntry,
    TaxonomyKind, Title, TitleChanges, TitleFilter, User, UserChanges,
};

struct TitleRecord {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category_id: Option<i64>,
}

/// Join row; `genre_id` becomes `None` when the genre is deleted.
struct GenreLink {
    title_id: i64,
    genre_id: Option<i64>,
}

struct ReviewRecord {
    id: i64,
    title_id: i64,
    author_id: i64,
    text: String,
    score: i32,
    pub_date: DateTime<Utc>,
}

struct CommentRecord {
    id: i64,
    review_id: i64,
    author_id: i64,
    text: String,
    pub_date: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<User>,
    categories: Vec<TaxonomyEntry>,
    genres: Vec<TaxonomyEntry>,
    titles: Vec<TitleRecord>,
    genre_links: Vec<GenreLink>,
    reviews: Vec<ReviewRecord>,
    comments: Vec<CommentRecord>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn taxonomy(&self, kind: TaxonomyKind) -> &Vec<TaxonomyEntry> {
        match kind {
            TaxonomyKind::Category => &self.categories,
            TaxonomyKind::Genre => &self.genres,
        }
    }

    fn taxonomy_mut(&mut self, kind: TaxonomyKind) -> &mut Vec<TaxonomyEntry> {
        match kind {
            TaxonomyKind::Category => &mut self.categories,
            TaxonomyKind::Genre => &mut self.genres,
        }
    }

    /// Mirrors the Postgres unique indexes: every other user is checked for the email
    /// before any is checked for the username.
    fn check_user_unique(&self, email: &str, username: &str, except: Option<i64>) -> RepoResult<()> {
        let mut others = self.users.iter().filter(|u| Some(u.id) != except);
        if others.clone().any(|u| u.email == email) {
            return Err(RepoError::UniqueViolation(constraints::USERS_EMAIL.into()));
        }
        if others.any(|u| u.username == username) {
            return Err(RepoError::UniqueViolation(constraints::USERS_USERNAME.into()));
        }
        Ok(())
    }

    fn username_of(&self, user_id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn build_title(&self, record: &TitleRecord) -> Title {
        let scores: Vec<i32> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == record.id)
            .map(|r| r.score)
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64)
        };

        let mut genre: Vec<TaxonomyEntry> = self
            .genre_links
            .iter()
            .filter(|link| link.title_id == record.id)
            .filter_map(|link| link.genre_id)
            .filter_map(|gid| self.genres.iter().find(|g| g.id == gid).cloned())
            .collect();
        genre.sort_by(|a, b| a.slug.cmp(&b.slug));

        let category = record
            .category_id
            .and_then(|cid| self.categories.iter().find(|c| c.id == cid).cloned());

        Title {
            id: record.id,
            name: record.name.clone(),
            year: record.year,
            rating,
            description: record.description.clone(),
            genre,
            category,
        }
    }

    fn build_review(&self, record: &ReviewRecord) -> Review {
        Review {
            id: record.id,
            title_id: record.title_id,
            author: self.username_of(record.author_id),
            author_id: record.author_id,
            text: record.text.clone(),
            score: record.score,
            pub_date: record.pub_date,
        }
    }

    fn build_comment(&self, record: &CommentRecord) -> Comment {
        Comment {
            id: record.id,
            review_id: record.review_id,
            author: self.username_of(record.author_id),
            author_id: record.author_id,
            text: record.text.clone(),
            pub_date: record.pub_date,
        }
    }

    fn link_genres(&mut self, title_id: i64, genre_ids: &[i64]) {
        self.genre_links
            .extend(genre_ids.iter().map(|&gid| GenreLink {
                title_id,
                genre_id: Some(gid),
            }));
    }

    fn remove_reviews_where(&mut self, predicate: impl Fn(&ReviewRecord) -> bool) {
        let doomed: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| predicate(r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| !doomed.contains(&r.id));
        self.comments.retain(|c| !doomed.contains(&c.review_id));
    }
}

/// MemoryRepository
///
/// A process-local implementation of the `Repository` trait with the same constraint names,
/// orderings and cascade rules as the Postgres schema. Backs the test suite.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants the superuser flag, the equivalent of a `createsuperuser` management task.
    pub async fn promote_superuser(&self, user_id: i64) -> bool {
        let mut store = self.store.write().await;
        match store.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                user.is_superuser = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users: Vec<User> = store
            .users
            .iter()
            .filter(|u| search.is_none_or(|term| contains_ci(&u.username, term)))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        store.check_user_unique(&user.email, &user.username, None)?;
        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
            is_superuser: false,
            confirmation: ConfirmationState::Consumed,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn get_or_create_user(&self, email: &str, username: &str) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if let Some(user) = store
            .users
            .iter()
            .find(|u| u.email == email && u.username == username)
        {
            return Ok(user.clone());
        }
        store.check_user_unique(email, username, None)?;
        let created = User {
            id: store.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            ..User::default()
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        let Some(current) = store.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let email = changes.email.unwrap_or(current.email);
        let username = changes.username.unwrap_or(current.username);
        store.check_user_unique(&email, &username, Some(id))?;

        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.email = email;
        user.username = username;
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        if store.users.len() == before {
            return Ok(false);
        }
        store.remove_reviews_where(|r| r.author_id == id);
        store.comments.retain(|c| c.author_id != id);
        Ok(true)
    }

    async fn set_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<()> {
        let mut store = self.store.write().await;
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.confirmation = ConfirmationState::Issued(code.to_string());
        }
        Ok(())
    }

    async fn consume_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        match store.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) if user.confirmation.accepts(code) => {
                user.confirmation = ConfirmationState::Consumed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_taxonomy(
        &self,
        kind: TaxonomyKind,
        search: Option<&str>,
    ) -> RepoResult<Vec<TaxonomyEntry>> {
        let store = self.store.read().await;
        let mut entries: Vec<TaxonomyEntry> = store
            .taxonomy(kind)
            .iter()
            .filter(|e| search.is_none_or(|term| contains_ci(&e.name, term)))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(entries)
    }

    async fn get_taxonomy_by_slug(
        &self,
        kind: TaxonomyKind,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>> {
        let store = self.store.read().await;
        Ok(store.taxonomy(kind).iter().find(|e| e.slug == slug).cloned())
    }

    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> RepoResult<TaxonomyEntry> {
        let mut store = self.store.write().await;
        if store.taxonomy(kind).iter().any(|e| e.slug == slug) {
            let constraint = match kind {
                TaxonomyKind::Category => constraints::CATEGORIES_SLUG,
                TaxonomyKind::Genre => constraints::GENRES_SLUG,
            };
            return Err(RepoError::UniqueViolation(constraint.into()));
        }
        let entry = TaxonomyEntry {
            id: store.next_id(),
            name: name.to_string(),
            slug: slug.to_string(),
        };
        store.taxonomy_mut(kind).push(entry.clone());
        Ok(entry)
    }

    async fn delete_taxonomy(&self, kind: TaxonomyKind, slug: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let Some(id) = store
            .taxonomy(kind)
            .iter()
            .find(|e| e.slug == slug)
            .map(|e| e.id)
        else {
            return Ok(false);
        };
        store.taxonomy_mut(kind).retain(|e| e.id != id);
        match kind {
            TaxonomyKind::Category => {
                for title in store.titles.iter_mut().filter(|t| t.category_id == Some(id)) {
                    title.category_id = None;
                }
            }
            TaxonomyKind::Genre => {
                for link in store
                    .genre_links
                    .iter_mut()
                    .filter(|l| l.genre_id == Some(id))
                {
                    link.genre_id = None;
                }
            }
        }
        Ok(true)
    }

    async fn list_titles(&self, filter: &TitleFilter) -> RepoResult<Vec<Title>> {
        let store = self.store.read().await;
        let mut titles: Vec<Title> = store
            .titles
            .iter()
            .map(|record| store.build_title(record))
            .filter(|t| filter.year.is_none_or(|year| t.year == year))
            .filter(|t| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| contains_ci(&t.name, name))
            })
            .filter(|t| {
                filter.category.as_deref().is_none_or(|slug| {
                    t.category.as_ref().is_some_and(|c| c.slug == slug)
                })
            })
            .filter(|t| {
                filter
                    .genre
                    .as_deref()
                    .is_none_or(|slug| t.genre.iter().any(|g| g.slug == slug))
            })
            .collect();
        titles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(titles)
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let store = self.store.read().await;
        Ok(store
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|record| store.build_title(record)))
    }

    async fn create_title(&self, title: NewTitle) -> RepoResult<Title> {
        let mut store = self.store.write().await;
        let id = store.next_id();
        store.titles.push(TitleRecord {
            id,
            name: title.name,
            year: title.year,
            description: title.description,
            category_id: title.category_id,
        });
        store.link_genres(id, &title.genre_ids);
        let record = store.titles.last().ok_or(RepoError::Database(sqlx::Error::RowNotFound))?;
        Ok(store.build_title(record))
    }

    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>> {
        let mut store = self.store.write().await;
        let Some(record) = store.titles.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            record.name = name;
        }
        if let Some(year) = changes.year {
            record.year = year;
        }
        if let Some(description) = changes.description {
            record.description = description;
        }
        if let Some(category_id) = changes.category_id {
            record.category_id = Some(category_id);
        }
        if let Some(genre_ids) = changes.genre_ids {
            store.genre_links.retain(|l| l.title_id != id);
            store.link_genres(id, &genre_ids);
        }
        Ok(store
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|record| store.build_title(record)))
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.titles.len();
        store.titles.retain(|t| t.id != id);
        if store.titles.len() == before {
            return Ok(false);
        }
        store.genre_links.retain(|l| l.title_id != id);
        store.remove_reviews_where(|r| r.title_id == id);
        Ok(true)
    }

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>> {
        let store = self.store.read().await;
        let mut reviews: Vec<Review> = store
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| store.build_review(r))
            .collect();
        reviews.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>> {
        let store = self.store.read().await;
        Ok(store
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .map(|r| store.build_review(r)))
    }

    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        let mut store = self.store.write().await;
        if store
            .reviews
            .iter()
            .any(|r| r.title_id == review.title_id && r.author_id == review.author_id)
        {
            return Err(RepoError::UniqueViolation(
                constraints::REVIEWS_TITLE_AUTHOR.into(),
            ));
        }
        let record = ReviewRecord {
            id: store.next_id(),
            title_id: review.title_id,
            author_id: review.author_id,
            text: review.text,
            score: review.score,
            pub_date: Utc::now(),
        };
        let created = store.build_review(&record);
        store.reviews.push(record);
        Ok(created)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i32>,
    ) -> RepoResult<Option<Review>> {
        let mut store = self.store.write().await;
        let Some(record) = store.reviews.iter_mut().find(|r| r.id == review_id) else {
            return Ok(None);
        };
        if let Some(text) = text {
            record.text = text;
        }
        if let Some(score) = score {
            record.score = score;
        }
        Ok(store
            .reviews
            .iter()
            .find(|r| r.id == review_id)
            .map(|r| store.build_review(r)))
    }

    async fn delete_review(&self, review_id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let existed = store.reviews.iter().any(|r| r.id == review_id);
        store.remove_reviews_where(|r| r.id == review_id);
        Ok(existed)
    }

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.store.read().await;
        let mut comments: Vec<Comment> = store
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| store.build_comment(c))
            .collect();
        comments.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .map(|c| store.build_comment(c)))
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let mut store = self.store.write().await;
        let record = CommentRecord {
            id: store.next_id(),
            review_id: comment.review_id,
            author_id: comment.author_id,
            text: comment.text,
            pub_date: Utc::now(),
        };
        let created = store.build_comment(&record);
        store.comments.push(record);
        Ok(created)
    }

    async fn update_comment(&self, comment_id: i64, text: String) -> RepoResult<Option<Comment>> {
        let mut store = self.store.write().await;
        let Some(record) = store.comments.iter_mut().find(|c| c.id == comment_id) else {
            return Ok(None);
        };
        record.text = text;
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| store.build_comment(c)))
    }

    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.comments.len();
        store.comments.retain(|c| c.id != comment_id);
        Ok(store.comments.len() < before)
    }
}
