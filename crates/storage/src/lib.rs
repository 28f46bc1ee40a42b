pub mod db;

pub use db::{
    create_db, create_optimization_request, get_goals, get_optimization_request,
    get_profile_end_date, get_setting, insert_goal, load_document, save_document,
    set_profile_end_date, set_setting, DbPool, OptimizationRequest, StorageError,
};
