/*!
 * Tests from a configuration file to translations through the controller
 */

use std::sync::Arc;

use mtgate::app_config::{Config, MapEnv, ProviderSettings};
use mtgate::app_controller::{Controller, Overrides};

use crate::common;

fn mock_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.provider = "mock".to_string();
    config.target_language = "fr".to_string();
    config.cache.path = Some(dir.join("cache.db"));
    config.retry.backoff_ms = 0;
    config
}

#[tokio::test]
async fn test_controller_withConfigFile_shouldTranslateAndCache() {
    let dir = common::create_temp_dir().unwrap();
    let config_path = dir.path().join("conf.json");
    mock_config(dir.path()).save(&config_path).unwrap();

    let controller = Controller::with_config(Config::load(&config_path).unwrap()).unwrap();
    let texts = vec!["Hello".to_string(), "42".to_string()];
    let result = controller
        .translate_texts(&texts, &Overrides::default(), false)
        .await
        .unwrap();
    assert_eq!(result, vec!["[TRANSLATED] Hello".to_string(), "42".to_string()]);

    let table = controller.cache_table_stats().await.unwrap().unwrap();
    assert_eq!(table.entries, 1);

    assert_eq!(controller.cache_clear().await.unwrap(), 1);
    assert_eq!(controller.cache_stats().await.unwrap().unwrap().entries, 0);
}

#[tokio::test]
async fn test_controller_withGlossaryOverride_shouldApplyTerms() {
    let dir = common::create_temp_dir().unwrap();
    let glossary = common::create_test_file(dir.path(), "terms.csv", "Hello,Salut\n").unwrap();
    let mut config = mock_config(dir.path());
    config.cache.enabled = false;

    let controller = Controller::with_config(config).unwrap();
    let overrides = Overrides {
        glossary_path: Some(glossary),
        ..Overrides::default()
    };
    let result = controller
        .translate_texts(&["Hello".to_string(), "Hello you".to_string()], &overrides, false)
        .await
        .unwrap();

    assert_eq!(result, vec!["Salut".to_string(), "[TRANSLATED] Salut you".to_string()]);
    assert!(controller.cache_stats().await.unwrap().is_none());
}

#[test]
fn test_controller_withExplicitSetting_shouldBeatEnvironment() {
    let mut config = Config::default();
    config.provider = "ollama".to_string();
    let controller = Controller::with_config(config)
        .unwrap()
        .with_env(Arc::new(MapEnv::new().with("OLLAMA_MODEL", "from-env")));

    let from_env = controller
        .build_translator_with_cache(&Overrides::default(), None)
        .unwrap();
    assert_eq!(from_env.candidates().to_string(), "from-env");

    let overrides = Overrides {
        settings: ProviderSettings::new().with("OLLAMA_MODEL", "explicit"),
        ..Overrides::default()
    };
    let explicit = controller.build_translator_with_cache(&overrides, None).unwrap();
    assert_eq!(explicit.candidates().to_string(), "explicit");

    let overrides = Overrides {
        models: Some("a;b".to_string()),
        ..Overrides::default()
    };
    let chained = controller.build_translator_with_cache(&overrides, None).unwrap();
    assert_eq!(chained.candidates().len(), 2);
}

#[test]
fn test_controller_withUnknownProviderOverride_shouldFail() {
    let controller = Controller::new_for_test().unwrap();
    let overrides = Overrides {
        provider: Some("babelfish".to_string()),
        ..Overrides::default()
    };
    let error = controller.build_translator_with_cache(&overrides, None).unwrap_err();
    assert!(error.to_string().contains("babelfish"));
}

#[tokio::test]
async fn test_controller_runBatch_withInMemoryCache_shouldHitOnSecondRound() {
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_test_file(dir.path(), "lines.txt", "one\ntwo\n\nthree\n").unwrap();
    let mut config = mock_config(dir.path());
    config.cache.in_memory = true;

    let controller = Controller::with_config(config).unwrap();
    let rounds = controller
        .run_batch(&input, &Overrides::default(), Some(2), 2, false)
        .await
        .unwrap();

    assert_eq!(rounds.len(), 2);
    for (reports, summary) in &rounds {
        assert_eq!(summary.total, 3);
        assert_eq!(reports[2].translation(), Some("[TRANSLATED] three"));
    }
}

#[tokio::test]
async fn test_controller_cachePrune_shouldKeepFreshEntries() {
    let dir = common::create_temp_dir().unwrap();
    let controller = Controller::with_config(mock_config(dir.path())).unwrap();
    controller
        .translate_texts(&["Hello".to_string()], &Overrides::default(), false)
        .await
        .unwrap();

    assert_eq!(controller.cache_prune(30).await.unwrap(), Some(0));
    assert_eq!(controller.cache_table_stats().await.unwrap().unwrap().entries, 1);

    let mut config = mock_config(dir.path());
    config.cache.in_memory = true;
    let in_memory = Controller::with_config(config).unwrap();
    assert_eq!(in_memory.cache_prune(30).await.unwrap(), None);
}
