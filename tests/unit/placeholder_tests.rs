/*!
 * Tests for the placeholder codec
 */

use mtgate::errors::TranslationError;
use mtgate::translation::{PlaceholderCodec, PlaceholderStyle};

#[test]
fn test_wrap_withRichText_shouldShareId() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::RichTextPair);
    let pair = codec.wrap(3);
    assert_eq!((pair.left.as_str(), pair.right.as_str()), ("<b3>", "</b3>"));
}

#[test]
fn test_wrap_withFormula_shouldUseConsecutiveIds() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::Formula);
    let pair = codec.wrap(4);
    assert_eq!((pair.left.as_str(), pair.right.as_str()), ("{{v4}}", "{{v5}}"));
}

#[test]
fn test_restore_withRichTextRoundTrip_shouldRecoverFormulaAndSpan() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::RichTextPair);
    let mut builder = codec.builder();
    builder.push_text("Energy ");
    builder.push_formula("$E=mc^2$");
    builder.push_text(" is ");
    builder.push_span("famous");
    let protected = builder.build();
    assert_eq!(protected.text, "Energy <b0></b0> is <b1>famous</b1>");

    // A backend that translates around the markers
    let output = "L'énergie <b0></b0> est <b1>célèbre</b1>";
    assert_eq!(
        codec.restore(output, &protected).unwrap(),
        "L'énergie $E=mc^2$ est célèbre"
    );
    assert_eq!(
        codec.extract_spans(output, &protected.pairs).unwrap(),
        vec!["célèbre".to_string()]
    );
}

#[test]
fn test_restore_withFormulaRoundTrip_shouldRecoverFormula() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::Formula);
    let mut builder = codec.builder();
    builder.push_text("Let ");
    builder.push_formula("x^2");
    builder.push_text(" be ");
    builder.push_span("positive");
    let protected = builder.build();
    assert_eq!(protected.text, "Let {{v0}} be {{v1}}positive{{v2}}");

    let output = "Soit {{v0}} {{v1}}positif{{v2}}";
    assert_eq!(codec.restore(output, &protected).unwrap(), "Soit x^2 positif");
}

#[test]
fn test_restore_withLenientSpacing_shouldStillMatch() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::Formula);
    let mut builder = codec.builder();
    builder.push_formula("a+b");
    let protected = builder.build();

    assert_eq!(codec.restore("{ v0 } ok", &protected).unwrap(), "a+b ok");
}

#[test]
fn test_restore_withDroppedMarker_shouldFailIntegrity() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::RichTextPair);
    let mut builder = codec.builder();
    builder.push_span("bold");
    let protected = builder.build();

    assert!(matches!(
        codec.restore("gras</b0>", &protected),
        Err(TranslationError::Integrity(_))
    ));
}

#[test]
fn test_restore_withReorderedPair_shouldFailIntegrity() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::RichTextPair);
    let mut builder = codec.builder();
    builder.push_span("bold");
    let protected = builder.build();

    assert!(codec.restore("</b0>gras<b0>", &protected).is_err());
}

#[test]
fn test_verify_shouldRejectMissingAndInventedMarkers() {
    let codec = PlaceholderCodec::new(PlaceholderStyle::RichTextPair);
    let source = "a <b0>b</b0> c";

    assert!(codec.verify(source, "x <b0>y</b0> z").is_ok());
    assert!(codec.verify(source, "x y z").is_err());
    assert!(codec.verify(source, "x <b0>y</b0> <b7>z</b7>").is_err());
    assert!(codec.verify("plain", "plain").is_ok());
}
