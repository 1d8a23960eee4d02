/*!
 * Tests for the glossary matcher
 */

use mtgate::errors::ConfigError;
use mtgate::translation::{Glossary, is_passthrough};

use crate::common;

#[test]
fn test_apply_withExactMatch_shouldShortCircuit() {
    let glossary = Glossary::new([("Hello", "Bonjour")]).unwrap();
    assert_eq!(glossary.apply("Hello"), ("Bonjour".to_string(), true));
}

#[test]
fn test_apply_withOverlappingKeys_shouldPreferLongest() {
    let glossary = Glossary::new([("New", "Nouveau"), ("New York", "New-York")]).unwrap();
    let (text, exact) = glossary.apply("I love New York and New things");
    assert!(!exact);
    assert_eq!(text, "I love New-York and Nouveau things");
}

#[test]
fn test_apply_withKeysOverlappingAtDifferentPositions_shouldReplaceLeftmost() {
    let glossary = Glossary::new([("ab", "X"), ("bcd", "Y")]).unwrap();
    let (text, exact) = glossary.apply("abcd");
    assert!(!exact);
    assert_eq!(text, "Xcd");

    // The longer key still wins where both start at the same place
    let (text, _) = glossary.apply("zbcd");
    assert_eq!(text, "zY");
}

#[test]
fn test_apply_withValueContainingKey_shouldNotRematch() {
    let glossary = Glossary::new([("cat", "big cat"), ("big", "huge")]).unwrap();
    let (text, _) = glossary.apply("a cat");
    assert_eq!(text, "a big cat");
}

#[test]
fn test_apply_withRegexMetacharacters_shouldMatchLiterally() {
    let glossary = Glossary::new([("C++", "C plus plus"), ("a.b", "ab")]).unwrap();
    let (text, _) = glossary.apply("C++ and axb and a.b");
    assert_eq!(text, "C plus plus and axb and ab");
}

#[test]
fn test_apply_withEmptyGlossary_shouldReturnInput() {
    let glossary = Glossary::empty();
    assert_eq!(glossary.apply("text"), ("text".to_string(), false));
    assert!(glossary.is_empty());
}

#[test]
fn test_fromCsvStr_shouldSkipHeaderAndComments() {
    let glossary = Glossary::from_csv_str(
        "source,target\n# terms\n\nGPU,\"processeur graphique\"\nCPU,processeur\n",
    )
    .unwrap();
    assert_eq!(glossary.len(), 2);
    assert_eq!(glossary.get("GPU"), Some("processeur graphique"));
}

#[test]
fn test_fromCsvStr_withMissingSeparator_shouldFail() {
    assert!(matches!(
        Glossary::from_csv_str("lonely"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_withJsonFile_shouldReadObject() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "terms.json", r#"{"kernel": "noyau"}"#).unwrap();

    let glossary = Glossary::load(&path).unwrap();
    assert_eq!(glossary.get("kernel"), Some("noyau"));
}

#[test]
fn test_load_withCsvFile_shouldReadLines() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "terms.txt", "kernel,noyau\n").unwrap();

    let glossary = Glossary::load(&path).unwrap();
    assert_eq!(glossary.apply("the kernel"), ("the noyau".to_string(), false));
}

#[test]
fn test_isPassthrough_shouldCoverNumbersSymbolsAndBlanks() {
    assert!(is_passthrough("2024"));
    assert!(is_passthrough("   "));
    assert!(is_passthrough("->"));
    assert!(!is_passthrough("Hello"));
    assert!(!is_passthrough("3 apples"));
}
