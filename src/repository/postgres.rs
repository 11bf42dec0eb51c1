use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

use super::{RepoError, RepoResult, Repository};
use crate::models::{
    Comment, NewComment, NewReview, NewTitle, NewUser, Review, TaxonomyEntry, TaxonomyKind,
    Title, TitleChanges, TitleFilter, User, UserChanges,
};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, role, is_superuser, confirmation_code";

/// Every title row carries its rating, averaged on the fly; nothing is denormalized.
const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description,
           (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE TRUE
"#;

const REVIEW_SELECT: &str = r#"
    SELECT r.id, r.title_id, u.username AS author, r.author_id, r.text, r.score, r.pub_date
    FROM reviews r
    JOIN users u ON u.id = r.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.review_id, u.username AS author, c.author_id, c.text, c.pub_date
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Flat title row before genres are attached.
#[derive(FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    rating: Option<f64>,
    category_id: Option<i64>,
    category_name: Option<String>,
    category_slug: Option<String>,
}

#[derive(FromRow)]
struct GenreLink {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

fn taxonomy_table(kind: TaxonomyKind) -> &'static str {
    match kind {
        TaxonomyKind::Category => "categories",
        TaxonomyKind::Genre => "genres",
    }
}

/// Wraps `term` for ILIKE, escaping the pattern metacharacters it may contain.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL. Cascades
/// and null-on-delete rules live in the schema (`migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the title query with optional filters and attaches each title's genres.
    async fn fetch_titles(&self, filter: &TitleFilter, id: Option<i64>) -> RepoResult<Vec<Title>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(TITLE_SELECT);

        if let Some(id) = id {
            builder.push(" AND t.id = ").push_bind(id);
        }
        if let Some(year) = filter.year {
            builder.push(" AND t.year = ").push_bind(year);
        }
        if let Some(name) = &filter.name {
            builder
                .push(" AND t.name ILIKE ")
                .push_bind(contains_pattern(name));
        }
        if let Some(category) = &filter.category {
            builder.push(" AND c.slug = ").push_bind(category.clone());
        }
        if let Some(genre) = &filter.genre {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
                     WHERE gt.title_id = t.id AND g.slug = ",
                )
                .push_bind(genre.clone())
                .push(")");
        }
        builder.push(" ORDER BY t.name, t.id");

        let rows: Vec<TitleRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let links: Vec<GenreLink> = sqlx::query_as(
            r#"
            SELECT gt.title_id, g.id, g.name, g.slug
            FROM genre_title gt
            JOIN genres g ON g.id = gt.genre_id
            WHERE gt.title_id = ANY($1)
            ORDER BY g.slug
            "#,
        )
        .bind(ids.as_slice())
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<TaxonomyEntry>> = HashMap::new();
        for link in links {
            genres.entry(link.title_id).or_default().push(TaxonomyEntry {
                id: link.id,
                name: link.name,
                slug: link.slug,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let category = match (row.category_id, row.category_name, row.category_slug) {
                    (Some(id), Some(name), Some(slug)) => Some(TaxonomyEntry { id, name, slug }),
                    _ => None,
                };
                Title {
                    genre: genres.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    name: row.name,
                    year: row.year,
                    rating: row.rating,
                    description: row.description,
                    category,
                }
            })
            .collect())
    }

    async fn fetch_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let mut titles = self.fetch_titles(&TitleFilter::default(), Some(id)).await?;
        Ok(titles.pop())
    }
}

/// Appends join rows for `genre_ids`; callers clear old links first when replacing.
async fn insert_genre_links(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    title_id: i64,
    genre_ids: &[i64],
) -> RepoResult<()> {
    if genre_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO genre_title (genre_id, title_id) SELECT g, $2 FROM UNNEST($1::bigint[]) AS g",
    )
    .bind(genre_ids)
    .bind(title_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<User>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(term) = search {
            builder
                .push(" WHERE username ILIKE ")
                .push_bind(contains_pattern(term));
        }
        builder.push(" ORDER BY id");

        Ok(builder.build_query_as::<User>().fetch_all(&self.pool).await?)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, bio, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.bio)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Conflicts on the `(username, email)` pair resolve to the existing row; a clash on
    /// either column alone surfaces as that column's unique violation.
    async fn get_or_create_user(&self, email: &str, username: &str) -> RepoResult<User> {
        let select = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND username = $2");

        if let Some(user) = sqlx::query_as::<_, User>(&select)
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(user);
        }

        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username) VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT users_username_email_key DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(user) => Ok(user),
            // A concurrent sign-up with the same pair won the insert.
            None => Ok(sqlx::query_as::<_, User>(&select)
                .bind(email)
                .bind(username)
                .fetch_one(&self.pool)
                .await?),
        }
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                bio = COALESCE($6, bio),
                role = COALESCE($7, role)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.bio)
        .bind(changes.role.map(|role| role.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CONFIRMATION CODES ---

    async fn set_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<()> {
        sqlx::query("UPDATE users SET confirmation_code = $2 WHERE id = $1")
            .bind(user_id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The row-level update is the serialization point: of two concurrent exchanges for the
    /// same code only one sees `rows_affected() == 1`.
    async fn consume_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET confirmation_code = NULL WHERE id = $1 AND confirmation_code = $2",
        )
        .bind(user_id)
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // --- CATEGORIES & GENRES ---

    async fn list_taxonomy(
        &self,
        kind: TaxonomyKind,
        search: Option<&str>,
    ) -> RepoResult<Vec<TaxonomyEntry>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT id, name, slug FROM {}",
            taxonomy_table(kind)
        ));
        if let Some(term) = search {
            builder
                .push(" WHERE name ILIKE ")
                .push_bind(contains_pattern(term));
        }
        builder.push(" ORDER BY id DESC");

        Ok(builder
            .build_query_as::<TaxonomyEntry>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_taxonomy_by_slug(
        &self,
        kind: TaxonomyKind,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>> {
        let entry = sqlx::query_as::<_, TaxonomyEntry>(&format!(
            "SELECT id, name, slug FROM {} WHERE slug = $1",
            taxonomy_table(kind)
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> RepoResult<TaxonomyEntry> {
        let entry = sqlx::query_as::<_, TaxonomyEntry>(&format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            taxonomy_table(kind)
        ))
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn delete_taxonomy(&self, kind: TaxonomyKind, slug: &str) -> RepoResult<bool> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE slug = $1",
            taxonomy_table(kind)
        ))
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- TITLES ---

    async fn list_titles(&self, filter: &TitleFilter) -> RepoResult<Vec<Title>> {
        self.fetch_titles(filter, None).await
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        self.fetch_title(id).await
    }

    async fn create_title(&self, title: NewTitle) -> RepoResult<Title> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO titles (name, year, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&title.name)
        .bind(title.year)
        .bind(&title.description)
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_genre_links(&mut tx, id, &title.genre_ids).await?;
        tx.commit().await?;

        self.fetch_title(id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>> {
        // `Some(None)` clears the description, so it cannot go through COALESCE.
        let description_set = changes.description.is_some();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE titles
            SET name = COALESCE($2, name),
                year = COALESCE($3, year),
                description = CASE WHEN $6 THEN $4 ELSE description END,
                category_id = COALESCE($5, category_id)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.year)
        .bind(changes.description.flatten())
        .bind(changes.category_id)
        .bind(description_set)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(genre_ids) = changes.genre_ids {
            sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_genre_links(&mut tx, id, &genre_ids).await?;
        }
        tx.commit().await?;

        self.fetch_title(id).await
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.title_id = $1 ORDER BY r.pub_date DESC, r.id DESC"
        ))
        .bind(title_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.title_id = $1 AND r.id = $2"
        ))
        .bind(title_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(review)
    }

    /// Inserts and joins the author's username in one round trip.
    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        let created = sqlx::query_as::<_, Review>(
            r#"
            WITH inserted AS (
                INSERT INTO reviews (title_id, author_id, text, score)
                VALUES ($1, $2, $3, $4)
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT i.id, i.title_id, u.username AS author, i.author_id, i.text, i.score, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(review.title_id)
        .bind(review.author_id)
        .bind(&review.text)
        .bind(review.score)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i32>,
    ) -> RepoResult<Option<Review>> {
        let updated = sqlx::query_as::<_, Review>(
            r#"
            WITH updated AS (
                UPDATE reviews
                SET text = COALESCE($2, text), score = COALESCE($3, score)
                WHERE id = $1
                RETURNING id, title_id, author_id, text, score, pub_date
            )
            SELECT x.id, x.title_id, u.username AS author, x.author_id, x.text, x.score, x.pub_date
            FROM updated x JOIN users u ON u.id = x.author_id
            "#,
        )
        .bind(review_id)
        .bind(text)
        .bind(score)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_review(&self, review_id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.review_id = $1 ORDER BY c.pub_date DESC, c.id DESC"
        ))
        .bind(review_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.review_id = $1 AND c.id = $2"
        ))
        .bind(review_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO comments (review_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT i.id, i.review_id, u.username AS author, i.author_id, i.text, i.pub_date
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(comment.review_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_comment(&self, comment_id: i64, text: String) -> RepoResult<Option<Comment>> {
        let updated = sqlx::query_as::<_, Comment>(
            r#"
            WITH updated AS (
                UPDATE comments SET text = $2 WHERE id = $1
                RETURNING id, review_id, author_id, text, pub_date
            )
            SELECT x.id, x.review_id, u.username AS author, x.author_id, x.text, x.pub_date
            FROM updated x JOIN users u ON u.id = x.author_id
            "#,
        )
        .bind(comment_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
