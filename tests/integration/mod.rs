//! Integration tests for stemcell-audit

mod helpers;
mod test_list;
mod test_run;
mod test_validate;
