use std::collections::BTreeMap;
use std::sync::Arc;

use repo_crawler_core::config::{CrawlerConfig, SourceControlConfig, SourceControlType, TaskDefinition};
use repo_crawler_core::contract::{MockOutputSink, MockSourceControlClient, OutputSink};
use repo_crawler_core::crawler::{CrawlReport, Crawler, FailedRepository};
use repo_crawler_core::error::{CrawlError, OutputError, RegistryError, SourceControlError};
use repo_crawler_core::model::{
    Branch, FileToParse, IndicatorDefinition, IndicatorsToFetch, PullRequest, Repository,
    RepositoryConfig,
};
use serde_json::Value;

const ORGANIZATION: &str = "orgName";

fn config() -> CrawlerConfig {
    CrawlerConfig::new(SourceControlConfig {
        kind: SourceControlType::Github,
        url: "https://api.github.com".to_string(),
        api_token: None,
        organization_name: ORGANIZATION.to_string(),
        crawl_users_repo_instead_of_orgas_repos: false,
    })
}

fn repository(name: &str) -> Repository {
    Repository::new(
        format!("https://github.com/{ORGANIZATION}/{name}"),
        format!("{ORGANIZATION}/{name}"),
        "master",
    )
}

/// A client serving `repositories`, none of them with a repo-level config,
/// and a `pom.xml` on every branch.
fn client_serving(repositories: Vec<Repository>) -> MockSourceControlClient {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client
        .expect_fetch_repositories()
        .withf(|organization: &str| organization == ORGANIZATION)
        .times(1)
        .returning(move |_| Ok(repositories.clone()));
    client
        .expect_fetch_repo_config()
        .returning(|_, _| Err(SourceControlError::NoFileFound(".githubCrawler".to_string())));
    client.expect_fetch_file_content().returning(|full_name: &str, _, _| {
        Ok(format!(
            "<project><artifactId>{full_name}</artifactId><version>1.0.0</version></project>"
        ))
    });
    client
        .expect_fetch_open_pull_requests()
        .returning(|_| Ok(vec![PullRequest { number: 7 }]));
    client
}

fn pom_version_indicator() -> IndicatorsToFetch {
    IndicatorsToFetch {
        file: FileToParse::new("pom.xml"),
        indicators: vec![IndicatorDefinition::new("pomVersion", "findFirstValueWithRegexpCapture")
            .with_param("pattern", "<version>(.*)</version>")],
    }
}

fn collecting_sink(expected_outputs: usize) -> MockOutputSink {
    let mut sink = MockOutputSink::new();
    sink.expect_output()
        .times(expected_outputs)
        .returning(|_| Ok(()));
    sink.expect_finalize_output().times(1).returning(|| Ok(()));
    sink
}

fn crawler(client: MockSourceControlClient, sinks: Vec<MockOutputSink>, config: CrawlerConfig) -> Crawler {
    let outputs: Vec<Arc<dyn OutputSink>> = sinks
        .into_iter()
        .map(|s| Arc::new(s) as Arc<dyn OutputSink>)
        .collect();
    Crawler::with_builtin(Arc::new(client), outputs, config).expect("built-in registry")
}

fn published_names(report: &CrawlReport) -> Vec<&str> {
    report.published.iter().map(|r| r.full_name.as_str()).collect()
}

#[tokio::test]
async fn every_repository_is_enriched_and_published() {
    let client = client_serving(vec![repository("repo1"), repository("repo2")]);
    let config = CrawlerConfig {
        indicators_to_fetch_by_file: vec![pom_version_indicator()],
        misc_repository_tasks: vec![TaskDefinition {
            kind: "nbOpenPRsOnRepo".to_string(),
            name: "nbOpenPRs".to_string(),
            params: BTreeMap::new(),
        }],
        groups: vec!["nightly".to_string()],
        ..config()
    };

    let report = crawler(client, vec![collecting_sink(2)], config)
        .crawl()
        .await
        .expect("crawl should succeed");

    assert_eq!(published_names(&report), vec!["orgName/repo1", "orgName/repo2"]);
    assert!(report.filtered_out.is_empty());
    assert!(report.failed.is_empty());

    let repo1 = &report.published[0];
    assert_eq!(repo1.crawler_run_id, report.crawler_run_id);
    assert_eq!(repo1.groups, vec!["nightly".to_string()]);
    assert_eq!(repo1.indicators_for_branch("master")["pomVersion"], "1.0.0");
    assert_eq!(
        repo1.misc_tasks_results[&Branch::new("master")]["nbOpenPRs"],
        Value::from(1)
    );
}

#[tokio::test]
async fn crawler_run_id_is_a_local_timestamp() {
    let client = client_serving(vec![repository("repo1")]);

    let report = crawler(client, vec![collecting_sink(1)], config())
        .crawl()
        .await
        .expect("crawl should succeed");

    let run_id = &report.crawler_run_id;
    assert_eq!(run_id.len(), "yyyyMMdd_HHmmss".len());
    assert_eq!(&run_id[8..9], "_");
    assert!(run_id.chars().filter(|c| *c != '_').all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn excluded_repositories_are_filtered_out_before_any_enrichment() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client
        .expect_fetch_repositories()
        .returning(|_| Ok(vec![repository("billing-legacy"), repository("billing")]));
    client
        .expect_fetch_repo_config()
        .withf(|full_name: &str, _: &str| full_name == "orgName/billing")
        .times(1)
        .returning(|_, _| Err(SourceControlError::NoFileFound(".githubCrawler".to_string())));
    client
        .expect_fetch_file_content()
        .withf(|full_name: &str, _: &str, _: &str| full_name == "orgName/billing")
        .returning(|_, _, _| Ok("<project><version>2.0.0</version></project>".to_string()));

    let config = CrawlerConfig {
        repositories_to_exclude: vec![".*-legacy$".to_string()],
        indicators_to_fetch_by_file: vec![pom_version_indicator()],
        ..config()
    };

    let report = crawler(client, vec![collecting_sink(1)], config)
        .crawl()
        .await
        .expect("crawl should succeed");

    assert_eq!(published_names(&report), vec!["orgName/billing"]);
    assert_eq!(report.filtered_out, vec!["orgName/billing-legacy".to_string()]);
}

#[tokio::test]
async fn excluded_repositories_are_published_untouched_when_configured() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client
        .expect_fetch_repositories()
        .returning(|_| Ok(vec![repository("billing-legacy"), repository("sandbox")]));
    client
        .expect_fetch_repo_config()
        .withf(|full_name: &str, _: &str| full_name == "orgName/sandbox")
        .returning(|_, _| {
            Ok(RepositoryConfig {
                excluded: true,
                ..RepositoryConfig::default()
            })
        });
    client.expect_fetch_file_content().times(0);

    let config = CrawlerConfig {
        repositories_to_exclude: vec!["legacy".to_string()],
        publish_excluded_repositories: true,
        indicators_to_fetch_by_file: vec![pom_version_indicator()],
        ..config()
    };

    let report = crawler(client, vec![collecting_sink(2)], config)
        .crawl()
        .await
        .expect("crawl should succeed");

    assert_eq!(
        published_names(&report),
        vec!["orgName/billing-legacy", "orgName/sandbox"]
    );
    let legacy = &report.published[0];
    let sandbox = &report.published[1];
    assert!(legacy.excluded);
    assert_eq!(legacy.reason.as_deref(), Some("excluded from server config side"));
    assert_eq!(legacy.config, None, "server-side exclusion skips the repo config");
    assert!(sandbox.excluded);
    assert_eq!(sandbox.reason.as_deref(), Some("excluded from repo config side"));
    assert!(legacy.indicators.is_empty());
    assert!(sandbox.indicators.is_empty());
    assert!(sandbox.misc_tasks_results.is_empty());
}

#[tokio::test]
async fn invalid_config_fails_before_fetching_repositories() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().times(0);
    client.expect_fetch_repositories().times(0);

    let mut config = config();
    config.source_control.url = " ".to_string();
    config.repositories_to_exclude = vec!["(unclosed".to_string()];
    config.repositories_to_include = vec!["^api-".to_string()];
    config.indicators_to_fetch_by_file = vec![IndicatorsToFetch {
        file: FileToParse::new("pom.xml"),
        indicators: vec![IndicatorDefinition::new("version", "findSomethingElse")],
    }];
    config.misc_repository_tasks = vec![TaskDefinition {
        kind: "nbStars".to_string(),
        name: "stars".to_string(),
        params: BTreeMap::new(),
    }];

    let mut sink = MockOutputSink::new();
    sink.expect_output().times(0);
    sink.expect_finalize_output().times(0);

    let result = crawler(client, vec![sink], config).crawl().await;

    match result {
        Err(CrawlError::InvalidConfig(errors)) => {
            assert_eq!(errors.len(), 5, "all errors are collected: {errors:?}");
            assert!(errors.contains(&"source-control.url can't be empty".to_string()));
            assert!(errors.iter().any(|e| e.contains("findSomethingElse")));
            assert!(errors.iter().any(|e| e.contains("nbStars")));
            assert!(errors.iter().any(|e| e.contains("(unclosed")));
        }
        other => panic!("expected an invalid config error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_platform_is_a_config_error() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_validate_remote_config()
        .returning(|_| Err(SourceControlError::NoReachableRepositories("401".to_string())));
    client.expect_fetch_repositories().times(0);

    let result = crawler(client, vec![], config()).crawl().await;

    match result {
        Err(CrawlError::InvalidConfig(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].starts_with("Not able to fetch repositories from the organization orgName"));
        }
        other => panic!("expected an invalid config error, got {other:?}"),
    }
}

#[tokio::test]
async fn task_missing_its_param_fails_the_crawl() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client.expect_fetch_repositories().times(0);

    let config = CrawlerConfig {
        misc_repository_tasks: vec![TaskDefinition {
            kind: "countHitsOnRepoSearch".to_string(),
            name: "nbLombokUsages".to_string(),
            params: BTreeMap::new(),
        }],
        ..config()
    };

    let result = crawler(client, vec![], config).crawl().await;

    assert!(matches!(
        result,
        Err(CrawlError::Registry(RegistryError::MissingTaskParam { .. }))
    ));
}

#[tokio::test]
async fn failing_repository_fetch_aborts_the_crawl() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client
        .expect_fetch_repositories()
        .returning(|_| Err(SourceControlError::Remote("503".to_string())));

    let mut sink = MockOutputSink::new();
    sink.expect_output().times(0);
    sink.expect_finalize_output().times(0);

    let result = crawler(client, vec![sink], config()).crawl().await;

    assert!(matches!(
        result,
        Err(CrawlError::FetchRepositories { ref organization, .. }) if organization == ORGANIZATION
    ));
}

#[tokio::test]
async fn failing_repository_is_reported_and_the_crawl_goes_on() {
    let mut client = MockSourceControlClient::new();
    client.expect_validate_remote_config().returning(|_| Ok(()));
    client
        .expect_fetch_repositories()
        .returning(|_| Ok(vec![repository("broken"), repository("healthy")]));
    client
        .expect_fetch_repo_config()
        .returning(|full_name: &str, _| match full_name {
            "orgName/broken" => Err(SourceControlError::Remote("500".to_string())),
            _ => Err(SourceControlError::NoFileFound(".githubCrawler".to_string())),
        });

    let report = crawler(client, vec![collecting_sink(1)], config())
        .crawl()
        .await
        .expect("one failing repository doesn't fail the crawl");

    assert_eq!(published_names(&report), vec!["orgName/healthy"]);
    assert_eq!(
        report.failed,
        vec![FailedRepository {
            full_name: "orgName/broken".to_string(),
            reason: "remote call failed: 500".to_string(),
        }]
    );
}

#[tokio::test]
async fn duplicate_repositories_are_processed_once() {
    let client = client_serving(vec![repository("repo1"), repository("repo1")]);

    let report = crawler(client, vec![collecting_sink(1)], config())
        .crawl()
        .await
        .expect("crawl should succeed");

    assert_eq!(published_names(&report), vec!["orgName/repo1"]);
}

#[tokio::test]
async fn output_errors_do_not_stop_other_outputs() {
    let client = client_serving(vec![repository("repo1"), repository("repo2")]);

    let mut failing = MockOutputSink::new();
    failing
        .expect_output()
        .times(2)
        .returning(|_| Err(OutputError::Other("disk full".to_string())));
    failing
        .expect_finalize_output()
        .times(1)
        .returning(|| Err(OutputError::Other("disk full".to_string())));

    let report = crawler(client, vec![failing, collecting_sink(2)], config())
        .crawl()
        .await
        .expect("output errors are not fatal");

    assert_eq!(report.published.len(), 2);
}

#[tokio::test]
async fn sequential_and_parallel_crawls_publish_the_same_repositories() {
    let repositories: Vec<Repository> = (1..=12).map(|i| repository(&format!("repo{i:02}"))).collect();
    let with_mode = |crawl_in_parallel: bool| CrawlerConfig {
        crawl_in_parallel,
        max_parallel_repositories: 4,
        repositories_to_exclude: vec!["repo0[3-5]".to_string()],
        indicators_to_fetch_by_file: vec![pom_version_indicator()],
        misc_repository_tasks: vec![TaskDefinition {
            kind: "nbOpenPRsOnRepo".to_string(),
            name: "nbOpenPRs".to_string(),
            params: BTreeMap::new(),
        }],
        ..config()
    };

    let sequential = crawler(
        client_serving(repositories.clone()),
        vec![collecting_sink(9)],
        with_mode(false),
    )
    .crawl()
    .await
    .expect("sequential crawl should succeed");
    let parallel = crawler(
        client_serving(repositories),
        vec![collecting_sink(9)],
        with_mode(true),
    )
    .crawl()
    .await
    .expect("parallel crawl should succeed");

    let normalized = |report: CrawlReport| -> Vec<Repository> {
        report
            .published
            .into_iter()
            .map(|r| r.with_crawler_run_id("run"))
            .collect()
    };
    assert_eq!(sequential.filtered_out, parallel.filtered_out);
    assert_eq!(sequential.filtered_out.len(), 3);
    assert_eq!(normalized(sequential), normalized(parallel));
}
