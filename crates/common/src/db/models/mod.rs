//! SeaORM entity models
//!
//! Database entities for PaperVault

mod paper;
mod user;

pub use paper::{
    ActiveModel as PaperActiveModel, Column as PaperColumn, Entity as PaperEntity,
    Model as PaperRecord, NewPaper, NOT_APPLICABLE,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity,
    Model as AdminUser,
};
