//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling. Search filters arrive as
//! [`CompiledFilter`]s and are rendered into SeaORM conditions here,
//! with every user-supplied value bound as a parameter.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, PersistenceFailure, Result};
use crate::query::{CompiledFilter, MatchOperator, Predicate, SearchColumn};
use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};

/// Escape character used in rendered LIKE patterns
const LIKE_ESCAPE: char = '\\';

const ASCII_UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ASCII_LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Persistent catalog of paper records.
///
/// Reads are always ordered by exam year (newest first), then subject.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record; fails with `Persistence { DuplicateFilename }` when
    /// the filename is already taken.
    async fn insert_paper(&self, paper: NewPaper) -> Result<PaperRecord>;

    /// Records matching `filter`, in catalog order
    async fn query_papers(&self, filter: &CompiledFilter) -> Result<Vec<PaperRecord>>;

    /// Every record, in catalog order
    async fn list_papers(&self) -> Result<Vec<PaperRecord>> {
        self.query_papers(&CompiledFilter::match_all()).await
    }
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.connection()
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create an admin user from an already-hashed password
    pub async fn create_user(&self, username: &str, password_hash: String) -> Result<AdminUser> {
        let user = UserActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            ..Default::default()
        };

        user.insert(self.conn()).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Duplicate {
                message: format!("user '{}' already exists", username),
            },
            _ => AppError::Database(e),
        })
    }

    /// Find user by username
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<AdminUser>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl MetadataStore for Repository {
    async fn insert_paper(&self, paper: NewPaper) -> Result<PaperRecord> {
        let filename = paper.filename.clone();
        let record = PaperActiveModel {
            class: Set(paper.class),
            subject: Set(paper.subject),
            semester: Set(paper.semester),
            exam_year: Set(paper.exam_year),
            exam_type: Set(paper.exam_type),
            paper_code: Set(paper.paper_code),
            exam_number: Set(paper.exam_number),
            medium: Set(paper.medium),
            university: Set(paper.university),
            time: Set(paper.time),
            max_marks: Set(paper.max_marks),
            uploader_name: Set(paper.uploader_name),
            filename: Set(paper.filename),
            upload_date: Set(chrono::Utc::now()),
            ..Default::default()
        };

        record
            .insert(self.conn())
            .await
            .map_err(|e| classify_insert_error(e, &filename))
    }

    async fn query_papers(&self, filter: &CompiledFilter) -> Result<Vec<PaperRecord>> {
        let mut select = PaperEntity::find();
        if !filter.is_match_all() {
            select = select.filter(render_filter(filter, self.conn().get_database_backend()));
        }

        select
            .order_by_desc(PaperColumn::ExamYear)
            .order_by_asc(PaperColumn::Subject)
            .order_by_asc(PaperColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }
}

fn classify_insert_error(err: DbErr, filename: &str) -> AppError {
    let kind = match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => PersistenceFailure::DuplicateFilename,
        Some(_) => PersistenceFailure::ConstraintViolation,
        None => PersistenceFailure::Backend,
    };

    AppError::Persistence {
        kind,
        message: format!("insert of '{}' rejected: {}", filename, err),
    }
}

/// AND of clauses, each an OR of `fold(col) LIKE '%value%'` predicates
fn render_filter(filter: &CompiledFilter, backend: DbBackend) -> Condition {
    filter.clauses().iter().fold(Condition::all(), |all, clause| {
        let any = clause
            .predicates
            .iter()
            .fold(Condition::any(), |any, predicate| {
                any.add(render_predicate(filter, predicate, backend))
            });
        all.add(any)
    })
}

fn render_predicate(filter: &CompiledFilter, predicate: &Predicate, backend: DbBackend) -> SimpleExpr {
    let column = paper_column(predicate.column);
    let Some(value) = filter.value_of(predicate) else {
        return Expr::value(false);
    };
    match predicate.operator {
        MatchOperator::ContainsIgnoreCase => {
            let pattern = format!("%{}%", escape_like(value));
            fold_ascii(column, backend).like(LikeExpr::new(pattern).escape(LIKE_ESCAPE))
        }
    }
}

/// ASCII-only lower-casing of a column. SQLite's `LOWER` already folds
/// ASCII only; PostgreSQL's is locale aware, so it gets `TRANSLATE`.
fn fold_ascii(column: PaperColumn, backend: DbBackend) -> Expr {
    match backend {
        DbBackend::Postgres => Expr::expr(
            Func::cust(Alias::new("TRANSLATE"))
                .arg(Expr::col(column))
                .arg(ASCII_UPPER)
                .arg(ASCII_LOWER),
        ),
        _ => Expr::expr(Func::lower(Expr::col(column))),
    }
}

fn paper_column(column: SearchColumn) -> PaperColumn {
    match column {
        SearchColumn::Class => PaperColumn::Class,
        SearchColumn::Subject => PaperColumn::Subject,
        SearchColumn::Semester => PaperColumn::Semester,
        SearchColumn::ExamYear => PaperColumn::ExamYear,
        SearchColumn::ExamType => PaperColumn::ExamType,
        SearchColumn::PaperCode => PaperColumn::PaperCode,
        SearchColumn::ExamNumber => PaperColumn::ExamNumber,
        SearchColumn::Medium => PaperColumn::Medium,
        SearchColumn::University => PaperColumn::University,
        SearchColumn::UploaderName => PaperColumn::UploaderName,
    }
}

/// Make `%`, `_` and the escape character itself match literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == '%' || ch == '_' || ch == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}
