// Backend boundary: the Bedrock runtime client and the retry loop around it.

pub mod client;
pub mod retry;
