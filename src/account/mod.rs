mod core;
mod endpoints;

pub use core::{
    Account, AccountType, AccountUpdate, NewAccount, create_account, create_account_table,
    get_account, get_accounts, get_total_account_balance, map_row_to_account, update_account,
};
pub use endpoints::{
    create_account_endpoint, delete_account_endpoint, get_accounts_endpoint,
    get_total_balance_endpoint, update_account_endpoint,
};
