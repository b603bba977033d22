use async_trait::async_trait;
use repo_crawler_core::contract::OutputSink;
use repo_crawler_core::error::OutputError;
use repo_crawler_core::model::Repository;

/// Prints each repository on stdout.
pub struct ConsoleOutput;

#[async_trait]
impl OutputSink for ConsoleOutput {
    async fn output(&self, repository: &Repository) -> Result<(), OutputError> {
        println!("{repository:?}");
        Ok(())
    }
}
