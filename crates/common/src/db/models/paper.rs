//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::query::{ColumnValues, SearchColumn};

/// Sentinel stored for optional attributes that were not supplied
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub class: String,

    #[sea_orm(column_type = "Text")]
    pub subject: String,

    #[sea_orm(column_type = "Text")]
    pub semester: String,

    /// Four-digit year, kept as text so it can be substring-searched
    #[sea_orm(column_type = "Text")]
    pub exam_year: String,

    #[sea_orm(column_type = "Text")]
    pub exam_type: String,

    #[sea_orm(column_type = "Text")]
    pub paper_code: String,

    #[sea_orm(column_type = "Text")]
    pub exam_number: String,

    #[sea_orm(column_type = "Text")]
    pub medium: String,

    #[sea_orm(column_type = "Text")]
    pub university: String,

    #[sea_orm(column_type = "Text")]
    pub time: String,

    #[sea_orm(column_type = "Text")]
    pub max_marks: String,

    #[sea_orm(column_type = "Text")]
    pub uploader_name: String,

    /// Join key into the file store
    #[sea_orm(column_type = "Text", unique)]
    pub filename: String,

    pub upload_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ColumnValues for Model {
    fn column_value(&self, column: SearchColumn) -> &str {
        match column {
            SearchColumn::Class => &self.class,
            SearchColumn::Subject => &self.subject,
            SearchColumn::Semester => &self.semester,
            SearchColumn::ExamYear => &self.exam_year,
            SearchColumn::ExamType => &self.exam_type,
            SearchColumn::PaperCode => &self.paper_code,
            SearchColumn::ExamNumber => &self.exam_number,
            SearchColumn::Medium => &self.medium,
            SearchColumn::University => &self.university,
            SearchColumn::UploaderName => &self.uploader_name,
        }
    }
}

/// Everything needed to insert a paper; id and upload date are assigned by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaper {
    pub class: String,
    pub subject: String,
    pub semester: String,
    pub exam_year: String,
    pub exam_type: String,
    pub paper_code: String,
    pub exam_number: String,
    pub medium: String,
    pub university: String,
    pub time: String,
    pub max_marks: String,
    pub uploader_name: String,
    pub filename: String,
}
