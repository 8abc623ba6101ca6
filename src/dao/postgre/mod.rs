pub use self::{
    path::get_path,
    types::{PoolOption, PoolType},
};

mod path;
mod token_analysis;
mod types;
