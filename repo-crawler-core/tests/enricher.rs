use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use repo_crawler_core::contract::{
    MockSourceControlClient, RepoTask, SourceControlClient, TaskBuilder,
};
use repo_crawler_core::enricher::RepositoryEnricher;
use repo_crawler_core::error::{EnrichmentError, SourceControlError};
use repo_crawler_core::model::{
    Branch, FileToParse, IndicatorDefinition, IndicatorsToFetch, PullRequest, Repository,
    RepositoryConfig,
};
use repo_crawler_core::parsers::builtin_parsers;
use repo_crawler_core::registry::IndicatorParserRegistry;
use repo_crawler_core::tasks::{NbBranchesOnRepoBuilder, NbOpenPrsOnRepoBuilder};
use serde_json::Value;

const POM: &str = "<project><dependencies><dependency><artifactId>lombok</artifactId><version>1.18.30</version></dependency></dependencies></project>";

fn enricher(client: MockSourceControlClient) -> RepositoryEnricher {
    let registry = IndicatorParserRegistry::new(builtin_parsers(), vec![])
        .expect("built-in parsers have unique names");
    RepositoryEnricher::new(Arc::new(client), Arc::new(registry))
}

fn repo() -> Repository {
    Repository {
        branches_to_parse: BTreeSet::from([Branch::new("master")]),
        ..Repository::new("https://github.com/orgName/repo1", "orgName/repo1", "master")
    }
}

fn pom_indicators() -> IndicatorsToFetch {
    IndicatorsToFetch {
        file: FileToParse::new("pom.xml"),
        indicators: vec![
            IndicatorDefinition::new("lombokVersion", "findDependencyVersionInXml")
                .with_param("artifactId", "lombok"),
            IndicatorDefinition::new("pomPath", "findFilePath"),
        ],
    }
}

#[tokio::test]
async fn excluded_repository_goes_through_indicators_and_tasks_untouched() {
    // no expectation: any call to the client would panic
    let client = MockSourceControlClient::new();
    let enricher = enricher(client);

    let excluded = Repository {
        excluded: true,
        reason: Some("excluded from server config side".to_string()),
        ..repo()
    };

    let after_indicators = enricher
        .fetch_indicators_values(excluded.clone(), &[pom_indicators()])
        .await
        .expect("excluded repo should not fail");
    let mut prs = MockSourceControlClient::new();
    prs.expect_fetch_open_pull_requests().times(0);
    let task = NbOpenPrsOnRepoBuilder::new(Arc::new(prs))
        .build("nbOpenPRs", &BTreeMap::new())
        .expect("no param needed");
    let after_tasks = enricher
        .perform_misc_tasks(after_indicators.clone(), &[task])
        .await
        .expect("excluded repo should not fail");

    assert_eq!(after_indicators, excluded);
    assert_eq!(after_tasks, excluded);
    assert!(after_tasks.indicators.is_empty());
    assert!(after_tasks.misc_tasks_results.is_empty());
}

#[tokio::test]
async fn redirected_file_is_fetched_from_its_new_path() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_file_content()
        .withf(|full_name: &str, branch: &str, path: &str| {
            full_name == "orgName/repo1" && branch == "master" && path == "modules/api/pom.xml"
        })
        .times(1)
        .returning(|_, _, _| Ok(POM.to_string()));

    let repository = Repository {
        config: Some(RepositoryConfig {
            files_to_parse: vec![FileToParse {
                name: "pom.xml".to_string(),
                redirect_to: Some("modules/api/pom.xml".to_string()),
            }],
            ..RepositoryConfig::default()
        }),
        ..repo()
    };

    let enriched = enricher(client)
        .fetch_indicators_values(repository, &[pom_indicators()])
        .await
        .expect("indicators should be fetched");

    let indicators = enriched.indicators_for_branch("master");
    assert_eq!(indicators["lombokVersion"], "1.18.30");
    assert_eq!(indicators["pomPath"], "modules/api/pom.xml");
}

#[tokio::test]
async fn last_file_in_configuration_order_wins_on_indicator_name_clash() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_file_content()
        .returning(|_, _, path: &str| match path {
            "Dockerfile" => Ok("FROM eclipse-temurin:17".to_string()),
            "build.gradle" => Ok("sourceCompatibility = '21'".to_string()),
            other => Err(SourceControlError::NoFileFound(other.to_string())),
        });

    let from_docker = IndicatorsToFetch {
        file: FileToParse::new("Dockerfile"),
        indicators: vec![IndicatorDefinition::new("javaVersion", "findFirstValueWithRegexpCapture")
            .with_param("pattern", r"temurin:(\d+)")],
    };
    let from_gradle = IndicatorsToFetch {
        file: FileToParse::new("build.gradle"),
        indicators: vec![IndicatorDefinition::new("javaVersion", "findFirstValueWithRegexpCapture")
            .with_param("pattern", r"sourceCompatibility = '(\d+)'")],
    };

    let enriched = enricher(client)
        .fetch_indicators_values(repo(), &[from_docker, from_gradle])
        .await
        .expect("indicators should be fetched");

    assert_eq!(enriched.indicators_for_branch("master")["javaVersion"], "21");
}

#[tokio::test]
async fn later_definition_in_the_same_file_wins_on_indicator_name_clash() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_file_content()
        .times(1)
        .returning(|_, _, _| Ok("FROM eclipse-temurin:17\nLABEL java=21".to_string()));

    let dockerfile = IndicatorsToFetch {
        file: FileToParse::new("Dockerfile"),
        indicators: vec![
            IndicatorDefinition::new("x", "findFirstValueWithRegexpCapture")
                .with_param("pattern", r"temurin:(\d+)"),
            IndicatorDefinition::new("x", "findFirstValueWithRegexpCapture")
                .with_param("pattern", r"java=(\d+)"),
        ],
    };

    let enriched = enricher(client)
        .fetch_indicators_values(repo(), &[dockerfile])
        .await
        .expect("indicators should be fetched");

    let indicators = enriched.indicators_for_branch("master");
    assert_eq!(indicators.len(), 1);
    assert_eq!(indicators["x"], "21");
}

#[tokio::test]
async fn missing_or_unreachable_file_contributes_no_indicator() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_file_content()
        .returning(|_, _, path: &str| match path {
            "pom.xml" => Ok(POM.to_string()),
            "package.json" => Err(SourceControlError::NoFileFound(path.to_string())),
            _ => Err(SourceControlError::Remote("502 Bad Gateway".to_string())),
        });

    let npm = IndicatorsToFetch {
        file: FileToParse::new("package.json"),
        indicators: vec![IndicatorDefinition::new("nodeVersion", "findValueForJsonPath")
            .with_param("jsonPath", "$.engines.node")],
    };
    let docker = IndicatorsToFetch {
        file: FileToParse::new("Dockerfile"),
        indicators: vec![IndicatorDefinition::new("baseImage", "findFirstValueWithRegexpCapture")
            .with_param("pattern", r"FROM (\S+)")],
    };

    let enriched = enricher(client)
        .fetch_indicators_values(repo(), &[npm, pom_indicators(), docker])
        .await
        .expect("a missing file is not an error");

    let indicators = enriched.indicators_for_branch("master");
    assert_eq!(
        indicators.keys().cloned().collect::<Vec<_>>(),
        vec!["lombokVersion".to_string(), "pomPath".to_string()]
    );
}

#[tokio::test]
async fn indicators_are_aggregated_per_branch() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_file_content()
        .returning(|_, branch: &str, _| Ok(format!("version={branch}-1")));

    let repository = Repository {
        branches_to_parse: BTreeSet::from([Branch::new("master"), Branch::new("develop")]),
        ..repo()
    };
    let properties = IndicatorsToFetch {
        file: FileToParse::new("gradle.properties"),
        indicators: vec![IndicatorDefinition::new("version", "findFirstValueWithRegexpCapture")
            .with_param("pattern", r"version=(\S+)")],
    };

    let enriched = enricher(client)
        .fetch_indicators_values(repository, &[properties])
        .await
        .expect("indicators should be fetched");

    assert_eq!(enriched.indicators_for_branch("master")["version"], "master-1");
    assert_eq!(enriched.indicators_for_branch("develop")["version"], "develop-1");
    assert!(enriched.indicators_for_branch("feature/x").is_empty());
}

#[tokio::test]
async fn repo_config_is_attached_when_found() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_repo_config()
        .withf(|full_name: &str, branch: &str| full_name == "orgName/repo1" && branch == "master")
        .returning(|_, _| {
            Ok(RepositoryConfig {
                excluded: true,
                ..RepositoryConfig::default()
            })
        });

    let enriched = enricher(client)
        .load_repo_specific_config_if_any(repo())
        .await
        .expect("config should load");

    assert_eq!(enriched.config.as_ref().map(|c| c.excluded), Some(true));
    assert!(!enriched.excluded, "the repo-level flag is applied by a later stage");
    assert!(enriched.flag_as_excluded_if_configured_at_repo_level().excluded);
}

#[tokio::test]
async fn missing_repo_config_leaves_repository_unchanged() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_repo_config()
        .returning(|_, _| Err(SourceControlError::NoFileFound(".githubCrawler".to_string())));

    let original = repo();

    let enriched = enricher(client)
        .load_repo_specific_config_if_any(original.clone())
        .await
        .expect("no config is fine");

    assert_eq!(enriched, original);
}

#[tokio::test]
async fn unparseable_repo_config_marks_repository_as_skipped() {
    let mut client = MockSourceControlClient::new();
    client.expect_fetch_repo_config().returning(|_, _| {
        Err(SourceControlError::RepoConfigParse(
            "unable to parse config for repo".to_string(),
        ))
    });

    let enriched = enricher(client)
        .load_repo_specific_config_if_any(repo())
        .await
        .expect("a broken config is not an error");

    assert!(enriched.skipped);
    assert!(!enriched.excluded);
    assert_eq!(enriched.reason.as_deref(), Some("unable to parse config for repo"));
}

#[tokio::test]
async fn transport_error_while_loading_repo_config_propagates() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_repo_config()
        .returning(|_, _| Err(SourceControlError::Remote("timeout".to_string())));

    let result = enricher(client).load_repo_specific_config_if_any(repo()).await;

    assert_eq!(
        result,
        Err(EnrichmentError::SourceControl(SourceControlError::Remote(
            "timeout".to_string()
        )))
    );
}

#[tokio::test]
async fn all_branches_are_parsed_when_configured() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_repo_branches()
        .times(1)
        .returning(|_| Ok(vec![Branch::new("master"), Branch::new("develop")]));
    let enricher = enricher(client);

    let all = enricher
        .identify_branches_to_parse(repo(), true)
        .await
        .expect("branches should be fetched");
    let default_only = enricher
        .identify_branches_to_parse(repo(), false)
        .await
        .expect("no call needed");

    assert_eq!(
        all.branches_to_parse,
        BTreeSet::from([Branch::new("develop"), Branch::new("master")])
    );
    assert_eq!(default_only.branches_to_parse, BTreeSet::from([Branch::new("master")]));
}

#[tokio::test]
async fn misc_task_results_are_merged_into_existing_ones() {
    let mut client = MockSourceControlClient::new();
    client
        .expect_fetch_open_pull_requests()
        .withf(|full_name: &str| full_name == "orgName/repo1")
        .times(1)
        .returning(|_| Ok(vec![PullRequest { number: 1 }, PullRequest { number: 2 }]));
    client
        .expect_fetch_repo_branches()
        .times(1)
        .returning(|_| Ok(vec![Branch::new("master"), Branch::new("develop"), Branch::new("hotfix")]));
    let client: Arc<dyn SourceControlClient> = Arc::new(client);
    let tasks: Vec<Arc<dyn RepoTask>> = vec![
        NbOpenPrsOnRepoBuilder::new(client.clone())
            .build("nbOpenPRs", &BTreeMap::new())
            .expect("no param needed"),
        NbBranchesOnRepoBuilder::new(client)
            .build("nbBranches", &BTreeMap::new())
            .expect("no param needed"),
    ];

    let repository = Repository {
        misc_tasks_results: BTreeMap::from([(
            Branch::new("master"),
            BTreeMap::from([("owningTeam".to_string(), Value::from("Stark"))]),
        )]),
        ..repo()
    };

    let enriched = enricher(MockSourceControlClient::new())
        .perform_misc_tasks(repository, &tasks)
        .await
        .expect("tasks should run");

    let results = &enriched.misc_tasks_results[&Branch::new("master")];
    assert_eq!(results.len(), 3);
    assert_eq!(results["nbOpenPRs"], Value::from(2));
    assert_eq!(results["nbBranches"], Value::from(3));
    assert_eq!(results["owningTeam"], Value::from("Stark"));
    assert_eq!(enriched.owner_team.as_deref(), Some("Stark"));
}
