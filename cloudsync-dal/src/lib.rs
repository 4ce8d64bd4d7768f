//! cloudsync-dal: declarative persistence for cloud resource inventories.
//!
//! Record types describe their columns once ([`table::Schema`]); the
//! [`table::TableManager`] renders parameterized INSERT/UPDATE/SELECT/DELETE
//! statements from that description and a [`filter::Expression`]; the
//! [`dao::Dao`] executes them against SQLite.

pub mod dao;
pub mod error;
pub mod filter;
pub mod page;
pub mod reader;
pub mod table;

pub use dao::{Dao, StoreWriter};
pub use error::{DalError, Result};
pub use filter::{
    AtomRule, Bindings, Expression, LogicOp, MAX_IN_LIMIT, Operator, Rule, SqlWhereOption, Value,
};
pub use page::{BasePage, MAX_PAGE_LIMIT, Order};
pub use reader::list_all;
pub use table::{
    CREATED_AT_FIELD, ID_FIELD, ListOption, Schema, Statement, Table, TableManager,
    UPDATED_AT_FIELD,
};
