//! End-to-end transformations: compile, apply, serialize, compare.

fn apply(stylesheet: &str, document: &str) -> String {
    let _ = env_logger::builder().is_test(true).try_init();
    larix::transform(stylesheet, document).unwrap()
}

const XSL_NS: &str = r#"xmlns:xsl="http://www.w3.org/1999/XSL/Transform""#;

fn stylesheet(body: &str) -> String {
    format!(r#"<xsl:stylesheet version="1.0" {XSL_NS}>{body}</xsl:stylesheet>"#)
}

#[test]
fn copy_through_text() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><xsl:apply-templates/></xsl:template>
           <xsl:template match="text()"><xsl:value-of select="."/></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r>hello</r>"), "hello");
}

#[test]
fn conditional_emits_only_when_true() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><out><xsl:if test="count(*)&gt;0"><yes/></xsl:if></out></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r><a/></r>"), "<out><yes/></out>");
    assert_eq!(apply(&xslt, "<r/>"), "<out/>");
}

#[test]
fn for_each_with_ascending_text_sort() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><ul><xsl:for-each select="item"><xsl:sort select="@k"/><li><xsl:value-of select="@k"/></li></xsl:for-each></ul></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r><item k="b"/><item k="a"/><item k="c"/></r>"#),
        "<ul><li>a</li><li>b</li><li>c</li></ul>"
    );
}

#[test]
fn for_each_with_descending_numeric_sort() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><ul><xsl:for-each select="item"><xsl:sort select="@k" data-type="number" order="descending"/><li><xsl:value-of select="@k"/></li></xsl:for-each></ul></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r><item k="10"/><item k="2"/><item k="30"/></r>"#),
        "<ul><li>30</li><li>10</li><li>2</li></ul>"
    );
}

#[test]
fn named_template_with_param() {
    let xslt = stylesheet(
        r#"<xsl:template name="greet"><xsl:param name="who"/>Hi <xsl:value-of select="$who"/></xsl:template>
           <xsl:template match="/"><xsl:call-template name="greet"><xsl:with-param name="who" select="'world'"/></xsl:call-template></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "Hi world");
}

#[test]
fn param_defaults_apply_when_not_passed() {
    let xslt = stylesheet(
        r#"<xsl:template name="greet"><xsl:param name="who" select="'nobody'"/>Hi <xsl:value-of select="$who"/></xsl:template>
           <xsl:template match="/"><xsl:call-template name="greet"/></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "Hi nobody");
}

#[test]
fn with_param_value_from_body() {
    let xslt = stylesheet(
        r#"<xsl:template name="greet"><xsl:param name="who"/>Hi <xsl:value-of select="$who"/></xsl:template>
           <xsl:template match="/"><xsl:call-template name="greet"><xsl:with-param name="who">moon</xsl:with-param></xsl:call-template></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "Hi moon");
}

#[test]
fn attribute_before_children_is_set() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><a><xsl:attribute name="id">x</xsl:attribute><b/></a></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), r#"<a id="x"><b/></a>"#);
}

#[test]
fn attribute_after_children_is_an_error_and_skipped() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><a><b/><xsl:attribute name="id">x</xsl:attribute></a></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<a><b/></a>");
}

#[test]
fn attribute_replaces_a_literal_attribute() {
    // Attributes are not children; overriding one is fine.
    let xslt = stylesheet(
        r#"<xsl:template match="/"><a id="x"><xsl:attribute name="id">y</xsl:attribute></a></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), r#"<a id="y"/>"#);
}

#[test]
fn attribute_named_xmlns_is_rejected() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><a><xsl:attribute name="xmlns">urn:x</xsl:attribute></a></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<a/>");
}

#[test]
fn attribute_with_explicit_namespace() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><o><xsl:attribute name="x" namespace="urn:n">v</xsl:attribute></o></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        r#"<o xmlns:ns0="urn:n" ns0:x="v"/>"#
    );
}

#[test]
fn comment_and_processing_instruction_nodes() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><o><xsl:comment>note</xsl:comment><xsl:processing-instruction name="target">data</xsl:processing-instruction></o></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<o><!--note--><?target data?></o>");
}

#[test]
fn value_of_with_disable_output_escaping() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><x><xsl:value-of select="'&lt;b&gt;'" disable-output-escaping="yes"/></x></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<x><b></x>");

    let xslt = stylesheet(
        r#"<xsl:template match="/"><x><xsl:value-of select="'&lt;b&gt;'"/></x></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<x>&lt;b&gt;</x>");
}

#[test]
fn attribute_value_templates_on_literal_elements() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><a href="/view/{@id}" title="{{not-an-expr}}"><xsl:value-of select="."/></a></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r id="7">go</r>"#),
        r#"<a href="/view/7" title="{not-an-expr}">go</a>"#
    );
}

#[test]
fn positions_and_size_are_threaded_through_iteration() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:for-each select="i"><p><xsl:value-of select="position()"/>/<xsl:value-of select="last()"/></p></xsl:for-each></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, "<r><i/><i/><i/></r>"),
        "<p>1/3</p><p>2/3</p><p>3/3</p>"
    );
}

#[test]
fn apply_templates_select_positions() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:apply-templates select="i"/></xsl:template>
           <xsl:template match="i"><p><xsl:value-of select="position()"/></p></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r><i/>text<i/></r>"), "<p>1</p><p>2</p>");
}

#[test]
fn sort_prelude_reorders_apply_templates() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:apply-templates select="i"><xsl:sort select="@k"/></xsl:apply-templates></xsl:template>
           <xsl:template match="i"><p><xsl:value-of select="@k"/>:<xsl:value-of select="position()"/></p></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r><i k="b"/><i k="a"/></r>"#),
        "<p>a:1</p><p>b:2</p>"
    );
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:for-each select="i"><xsl:sort select="@k"/><p><xsl:value-of select="."/></p></xsl:for-each></xsl:template>"#,
    );
    assert_eq!(
        apply(
            &xslt,
            r#"<r><i k="b">1</i><i k="a">2</i><i k="b">3</i><i k="a">4</i></r>"#
        ),
        "<p>2</p><p>4</p><p>1</p><p>3</p>"
    );
}

#[test]
fn multi_key_sort_earlier_key_dominates() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:for-each select="i"><xsl:sort select="@g"/><xsl:sort select="@n" data-type="number" order="descending"/><p><xsl:value-of select="@g"/><xsl:value-of select="@n"/></p></xsl:for-each></xsl:template>"#,
    );
    assert_eq!(
        apply(
            &xslt,
            r#"<r><i g="x" n="1"/><i g="w" n="2"/><i g="x" n="9"/></r>"#
        ),
        "<p>w2</p><p>x9</p><p>x1</p>"
    );
}

#[test]
fn unparsable_numeric_keys_sort_last_in_any_direction() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:for-each select="i"><xsl:sort select="@n" data-type="number"/><p><xsl:value-of select="@n"/></p></xsl:for-each></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r><i n="x"/><i n="2"/><i n="1"/></r>"#),
        "<p>1</p><p>2</p><p>x</p>"
    );

    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:for-each select="i"><xsl:sort select="@n" data-type="number" order="descending"/><p><xsl:value-of select="@n"/></p></xsl:for-each></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, r#"<r><i n="x"/><i n="2"/><i n="1"/></r>"#),
        "<p>2</p><p>1</p><p>x</p>"
    );
}

#[test]
fn empty_for_each_body_emits_nothing() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><out><xsl:for-each select="i"></xsl:for-each></out></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r><i/><i/><i/></r>"), "<out/>");
}

#[test]
fn transformation_is_deterministic() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><o><xsl:for-each select="i"><xsl:sort select="@k"/><v><xsl:value-of select="@k"/></v></xsl:for-each></o></xsl:template>"#,
    );
    let xml = r#"<r><i k="c"/><i k="a"/><i k="b"/></r>"#;
    let first = apply(&xslt, xml);
    let second = apply(&xslt, xml);
    assert_eq!(first, second);
    assert_eq!(first, "<o><v>a</v><v>b</v><v>c</v></o>");
}

#[test]
fn literal_namespaces_declare_once_and_are_reused() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><v:outer xmlns:v="urn:v"><v:inner/></v:outer></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        r#"<v:outer xmlns:v="urn:v"><v:inner/></v:outer>"#
    );
}

#[test]
fn default_namespace_on_literal_elements() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><out xmlns="urn:d"><in/></out></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), r#"<out xmlns="urn:d"><in/></out>"#);
}

#[test]
fn namespace_is_searched_up_the_result_tree() {
    // The inner v:leaf sits under an unprefixed element; the binding comes
    // from the ancestor declaration, with no redeclaration on the leaf.
    let xslt = stylesheet(
        r#"<xsl:template match="/"><v:outer xmlns:v="urn:v"><plain><v:leaf/></plain></v:outer></xsl:template>"#,
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        r#"<v:outer xmlns:v="urn:v"><plain><v:leaf/></plain></v:outer>"#
    );
}

#[test]
fn call_template_resolves_prefix_against_the_insertion_point() {
    let xslt = format!(
        r#"<xsl:stylesheet version="1.0" {XSL_NS} xmlns:g="urn:greet">
            <xsl:template name="g:hello">hi</xsl:template>
            <xsl:template match="/"><out xmlns:h="urn:greet"><xsl:call-template name="h:hello"/></out></xsl:template>
        </xsl:stylesheet>"#
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        r#"<out xmlns:h="urn:greet">hi</out>"#
    );
}

#[test]
fn call_template_with_unknown_name_is_a_noop() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><out><xsl:call-template name="missing"/></out></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<out/>");
}

#[test]
fn unimplemented_element_instruction_is_skipped() {
    let xslt = stylesheet(
        r#"<xsl:template match="/"><out><xsl:element name="x">inner</xsl:element></out></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r/>"), "<out/>");
}

#[test]
fn explicit_priority_beats_the_default() {
    let xslt = stylesheet(
        r#"<xsl:template match="i">name</xsl:template>
           <xsl:template match="*" priority="1">wild</xsl:template>
           <xsl:template match="r" priority="2"><xsl:apply-templates select="i"/></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r><i/></r>"), "wild");
}

#[test]
fn later_declaration_wins_priority_ties() {
    let xslt = stylesheet(
        r#"<xsl:template match="i">first</xsl:template>
           <xsl:template match="i">second</xsl:template>
           <xsl:template match="r"><xsl:apply-templates select="i"/></xsl:template>"#,
    );
    assert_eq!(apply(&xslt, "<r><i/></r>"), "second");
}

#[test]
fn stripping_is_idempotent_across_runs() {
    let xslt = format!(
        r#"<xsl:stylesheet version="1.0" {XSL_NS}>
            <xsl:strip-space elements="*"/>
            <xsl:template match="r"><o><xsl:apply-templates/></o></xsl:template>
        </xsl:stylesheet>"#
    );
    let xml = "<r>\n  <i>a</i>\n  <i>b</i>\n</r>";
    let first = apply(&xslt, xml);
    assert_eq!(first, "<o>ab</o>");
    assert_eq!(apply(&xslt, xml), first);
}

#[test]
fn text_output_method_concatenates() {
    let xslt = format!(
        r#"<xsl:stylesheet version="1.0" {XSL_NS}>
            <xsl:output method="text"/>
            <xsl:template match="r"><wrapper>one </wrapper><xsl:value-of select="i"/></xsl:template>
        </xsl:stylesheet>"#
    );
    assert_eq!(apply(&xslt, "<r><i>two</i></r>"), "one two");
}

#[test]
fn html_output_method_with_doctype() {
    let xslt = format!(
        r#"<xsl:stylesheet version="1.0" {XSL_NS}>
            <xsl:output method="html" doctype-public="-//W3C//DTD HTML 4.01//EN"/>
            <xsl:template match="/"><html><body><br/><p>x</p></body></html></xsl:template>
        </xsl:stylesheet>"#
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\"><html><body><br><p>x</p></body></html>"
    );
}

#[test]
fn xml_output_with_version_and_doctype() {
    let xslt = format!(
        r#"<xsl:stylesheet version="1.0" {XSL_NS}>
            <xsl:output method="xml" version="1.0" doctype-system="root.dtd"/>
            <xsl:template match="/"><root><leaf/></root></xsl:template>
        </xsl:stylesheet>"#
    );
    assert_eq!(
        apply(&xslt, "<r/>"),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE root SYSTEM \"root.dtd\"><root><leaf/></root>"
    );
}

#[test]
fn variables_shadow_and_expire_with_their_body() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><o>
            <xsl:variable name="x" select="'outer'"/>
            <xsl:for-each select="i"><xsl:variable name="x" select="'inner'"/><a><xsl:value-of select="$x"/></a></xsl:for-each>
            <b><xsl:value-of select="$x"/></b>
        </o></xsl:template>"#,
    );
    let out = apply(&xslt, "<r><i/></r>");
    assert!(out.contains("<a>inner</a>"));
    assert!(out.contains("<b>outer</b>"));
}

#[test]
fn nested_apply_templates_restores_context() {
    let xslt = stylesheet(
        r#"<xsl:template match="r"><xsl:apply-templates select="g"/></xsl:template>
           <xsl:template match="g"><g><xsl:apply-templates select="i"/><s><xsl:value-of select="position()"/></s></g></xsl:template>
           <xsl:template match="i"><i><xsl:value-of select="position()"/></i></xsl:template>"#,
    );
    // After the inner iteration, the outer one continues with its own
    // positions: the second <g> still reports position 2.
    assert_eq!(
        apply(&xslt, "<r><g><i/><i/></g><g><i/></g></r>"),
        "<g><i>1</i><i>2</i><s>1</s></g><g><i>1</i><s>2</s></g>"
    );
}
