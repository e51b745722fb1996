pub mod download;
pub mod poller;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
