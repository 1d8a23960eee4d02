/*!
 * Tests for language code mapping
 */

use mtgate::language_utils::{LanguageMap, LanguagePair, is_auto, language_name};

#[test]
fn test_languageMap_resolve_shouldMapCaseInsensitively() {
    let map = LanguageMap::from_pairs([("zh", "zh-CN")]);
    assert_eq!(map.resolve("ZH"), "zh-CN");
    assert_eq!(map.resolve("fr"), "fr");
}

#[test]
fn test_languagePair_resolve_shouldMapBothSides() {
    let map = LanguageMap::from_pairs([("zh", "zh-Hans")]);
    let pair = LanguagePair::resolve(&map, "auto", "zh");
    assert_eq!(pair.target, "zh-Hans");
    assert!(pair.is_auto_source());
}

#[test]
fn test_isAuto_shouldIgnoreCaseAndWhitespace() {
    assert!(is_auto(" AUTO "));
    assert!(!is_auto("en"));
}

#[test]
fn test_languageName_shouldHandleCommonForms() {
    assert_eq!(language_name("fr"), "French");
    assert_eq!(language_name("ger"), "German");
    assert_eq!(language_name("zh-TW"), "Traditional Chinese");
    assert_eq!(language_name("zh-Hans"), "Simplified Chinese");
    assert_eq!(language_name("pt_BR"), "Portuguese");
    assert_eq!(language_name("klingon"), "klingon");
}
