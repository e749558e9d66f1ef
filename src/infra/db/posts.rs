use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{CreatePostParams, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams},
    domain::entities::PostRecord,
};

use super::{PostgresRepositories, map_sqlx_error, util::contains_pattern};

const POST_COLUMNS: &str = "p.id, p.title, p.description, p.body, p.category_id, \
    c.name AS category_name, p.image_path, p.created_at, p.updated_at";

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    description: String,
    body: String,
    category_id: i64,
    category_name: String,
    image_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            body: row.body,
            category_id: row.category_id,
            category_name: row.category_name,
            image_path: row.image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    async fn fetch_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE p.id = $1"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             INNER JOIN categories c ON c.id = p.category_id \
             {NEWEST_FIRST}"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn list_by_category(&self, category_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE p.category_id = $1 \
             {NEWEST_FIRST}"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(category_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn search_posts(&self, query: &str) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             INNER JOIN categories c ON c.id = p.category_id \
             WHERE p.title ILIKE $1 OR p.description ILIKE $1 OR p.body ILIKE $1 \
             {NEWEST_FIRST}"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(contains_pattern(query))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        self.fetch_post(id).await
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO posts (title, description, body, category_id, image_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&params.title)
        .bind(&params.description)
        .bind(&params.body)
        .bind(params.category_id)
        .bind(params.image_path.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.fetch_post(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = $2,
                description = $3,
                body = $4,
                category_id = $5,
                image_path = $6,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.description)
        .bind(&params.body)
        .bind(params.category_id)
        .bind(params.image_path.as_deref())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.fetch_post(params.id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
