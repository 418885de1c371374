//! Embedded assets for the HTML exporter: icons, the stylesheet and the
//! client-side script for collapsible trees and view filtering.

use slug::slugify;

/// Inline icon span. The trailing space separates it from following text.
#[must_use]
pub fn icon(name: &str, size: u32) -> String {
    format!("<span class=\"icon icon-{name}\" style=\"width: {size}px; height: {size}px\"></span> ")
}

/// Inline icon span for a work item type.
#[must_use]
pub fn type_icon(type_name: &str, size: u32) -> String {
    icon(&format!("wi-{}", slugify(type_name)), size)
}

/// Percent-encode SVG markup for use inside a `url("data:image/svg+xml,...")`
/// CSS value.
#[must_use]
pub fn encode_svg(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    for byte in svg.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

pub const TAG_ICON: &str = "tag";

pub const TAG_ICON_BODY: &str = r#"<svg version="1.1" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 512 512" xmlns:xlink="http://www.w3.org/1999/xlink" enable-background="new 0 0 512 512">
  <g>
    <path d="m368.4,90.3c-30.3,0-54.9,24.6-54.9,54.9s24.6,54.9 54.9,54.9c30.3,0 54.9-24.6 54.9-54.9s-24.6-54.9-54.9-54.9zm0,69.1c-7.8,0-14.2-6.3-14.2-14.2s6.3-14.2 14.2-14.2c7.8,0 14.2,6.3 14.2,14.2s-6.4,14.2-14.2,14.2z"/>
    <path d="m54.4,312.2l142.4,144.5 262.8-259-22.9-119.7-119.4-24.8-262.9,259h2.13163e-14zm142.4,188c-9.2,0-17.9-3.6-24.4-10.2l-151.6-153.9c-13.2-13.4-13.1-35.1 0.4-48.4l270-266c8.1-8 19.9-11.5 31-9.1l127,26.4c13.6,2.8 24,13.5 26.7,27.1l24.5,127.4c2.2,11.3-1.4,22.8-9.6,30.9l-270,266c-6.4,6.3-15,9.8-24,9.8z"/>
  </g>
</svg>"#;

pub const EXPAND_ICON: &str = "expand";

pub const EXPAND_ICON_BODY: &str = r##"<svg fill="#000000" viewBox="0 0 16 16" xmlns="http://www.w3.org/2000/svg"><g><path d="M12.36,1H3.64A2.64,2.64,0,0,0,1,3.64v8.72A2.64,2.64,0,0,0,3.64,15h8.72A2.64,2.64,0,0,0,15,12.36V3.64A2.64,2.64,0,0,0,12.36,1ZM13.6,12.36a1.25,1.25,0,0,1-1.24,1.24H3.64A1.25,1.25,0,0,1,2.4,12.36V3.64A1.25,1.25,0,0,1,3.64,2.4h8.72A1.25,1.25,0,0,1,13.6,3.64ZM8.7,4H7.3V7.31H4v1.4H7.3V12H8.7V8.71H12V7.31H8.7Z"></path></g></svg>"##;

pub const COLLAPSE_ICON: &str = "collapse";

pub const COLLAPSE_ICON_BODY: &str = r##"<svg fill="#000000" viewBox="0 0 16 16" xmlns="http://www.w3.org/2000/svg"><g><path d="M12.36,1H3.64A2.64,2.64,0,0,0,1,3.64v8.72A2.64,2.64,0,0,0,3.64,15h8.72A2.64,2.64,0,0,0,15,12.36V3.64A2.64,2.64,0,0,0,12.36,1ZM13.6,12.36a1.25,1.25,0,0,1-1.24,1.24H3.64A1.25,1.25,0,0,1,2.4,12.36V3.64A1.25,1.25,0,0,1,3.64,2.4h8.72A1.25,1.25,0,0,1,13.6,3.64ZM4,8.71h8V7.31H4Z"></path></g></svg>"##;

pub const BACK_TO_TOP: &str = r##"<a id="back-to-top" href="#top">
    <svg fill="#000000" viewBox="0 0 24 24" xmlns="http://www.w3.org/2000/svg" style="width: 45px; height: 45px;">
        <g><path d="M5 21h14a2 2 0 0 0 2-2V5a2 2 0 0 0-2-2H5a2 2 0 0 0-2 2v14a2 2 0 0 0 2 2zm7-14 5 5h-4v5h-2v-5H7l5-5z"></path></g>
    </svg>
</a>
"##;

/// Collapsible list / data grid / tab bar behavior. Emitted verbatim at
/// the end of the document body.
pub const SCRIPT: &str = r##"
<script>
    var caretIcon = '<svg class="tree-caret caret-open" width=13 height=13 clip-rule="evenodd" fill-rule="evenodd" stroke-linejoin="round" stroke-miterlimit="2" viewBox="5 5 14 14" xmlns="http://www.w3.org/2000/svg"><path d="m16.843 10.211c.108-.141.157-.3.157-.456 0-.389-.306-.755-.749-.755h-8.501c-.445 0-.75.367-.75.755 0 .157.05.316.159.457 1.203 1.554 3.252 4.199 4.258 5.498.142.184.36.29.592.29.23 0 .449-.107.591-.291 1.002-1.299 3.044-3.945 4.243-5.498z"/></svg>';

    function initCollapsibleLists() {
        for (const listRoot of document.querySelectorAll("ul.collapsible-list")) {
            for (const li of listRoot.querySelectorAll("li")) {
                var sibling = li.nextElementSibling;

                if (sibling != null && sibling.tagName.toLowerCase() == 'ul') {
                    li.insertAdjacentHTML('afterbegin', caretIcon.replace('tree-caret', 'collapsible-list-caret'));
                    li.querySelector(".collapsible-list-caret").addEventListener('click', onCollapsibleListCaretClick);
                }
            }

            collapsibleListSetAllCarets(listRoot, false);
        }

        for (const actionElem of document.querySelectorAll("[data-list-action]")) {
            var action = actionElem.getAttribute("data-list-action");

            if (action == 'collapse-all') {
                actionElem.addEventListener('click', onCollapsibleListCollapseAll);
            } else if (action == 'expand-all') {
                actionElem.addEventListener('click', onCollapsibleListExpandAll);
            }
        }
    }

    function collapsibleListSetCaret(caret, open) {
        var li = caret.closest("li");
        var children = li && li.nextElementSibling;

        if (li != null && children != null) {
            var classToAdd = open ? 'open' : 'closed';
            var classToRemove = open ? 'closed' : 'open';

            caret.classList.add("caret-" + classToAdd);
            caret.classList.remove("caret-" + classToRemove);

            children.classList.add("children-" + classToAdd);
            children.classList.remove("children-" + classToRemove);
        }
    }

    function collapsibleListSetAllCarets(list, open) {
        for (const caret of list.querySelectorAll(".collapsible-list-caret")) {
            collapsibleListSetCaret(caret, open);
        }
    }

    function onCollapsibleListCaretClick(event) {
        var caret = event.target.closest(".collapsible-list-caret");

        collapsibleListSetCaret(caret, !caret.classList.contains('caret-open'));
    }

    function onCollapsibleListCollapseAll(event) {
        var selector = event.target.closest("[data-list-selector]").getAttribute('data-list-selector');

        collapsibleListSetAllCarets(document.querySelector(selector), false);
    }

    function onCollapsibleListExpandAll(event) {
        var selector = event.target.closest("[data-list-selector]").getAttribute('data-list-selector');

        collapsibleListSetAllCarets(document.querySelector(selector), true);
    }

    function initCollapsibleDataGrids() {
        for (const gridRoot of document.querySelectorAll("table.collapsible-data-grid")) {
            for (const td of gridRoot.querySelectorAll("td.data-grid-caret-column")) {
                var tr = td.closest('tr');
                var id = tr.getAttribute('data-grid-row-id');
                var children = gridRoot.querySelectorAll('tr[data-grid-parent-row-id="' + id + '"]');

                if (children != null && children.length > 0) {
                    td.insertAdjacentHTML('afterbegin', caretIcon.replace('tree-caret', 'collapsible-data-grid-caret'));
                    td.querySelector(".collapsible-data-grid-caret").addEventListener('click', onCollapsibleDataGridCaretClick);
                }
            }

            collapsibleDataGridSetAllCarets(gridRoot, false);
        }

        for (const actionElem of document.querySelectorAll("[data-grid-action]")) {
            var action = actionElem.getAttribute("data-grid-action");

            if (action == 'collapse-all') {
                actionElem.addEventListener('click', onCollapsibleDataGridCollapseAll);
            } else if (action == 'expand-all') {
                actionElem.addEventListener('click', onCollapsibleDataGridExpandAll);
            }
        }
    }

    function collapsibleDataGridSetCaret(caret, open) {
        var tr = caret.closest("tr");
        var id = tr.getAttribute('data-grid-row-id');
        var gridRoot = tr.closest("table");
        var children = gridRoot.querySelectorAll('tr[data-grid-parent-row-id="' + id + '"]');

        if (children != null && children.length > 0) {
            var classToAdd = open ? 'open' : 'closed';
            var classToRemove = open ? 'closed' : 'open';

            tr.classList.add(classToAdd);
            tr.classList.remove(classToRemove);

            caret.classList.add("caret-" + classToAdd);
            caret.classList.remove("caret-" + classToRemove);

            for (const child of children) {
                collapsibleDataGridSetChild(child, open);
            }
        }
    }

    function collapsibleDataGridSetChild(tr, open) {
        var id = tr.getAttribute('data-grid-row-id');
        var gridRoot = tr.closest("table");

        var classToAdd = open ? 'open' : 'closed';
        var classToRemove = open ? 'closed' : 'open';

        tr.classList.add("parent-" + classToAdd);
        tr.classList.remove("parent-" + classToRemove);

        var caret = tr.querySelector("td .collapsible-data-grid-caret");

        if (caret != null && caret.classList.contains('caret-open')) {
            for (const child of gridRoot.querySelectorAll('tr[data-grid-parent-row-id="' + id + '"]')) {
                collapsibleDataGridSetChild(child, open);
            }
        }
    }

    function collapsibleDataGridSetAllCarets(grid, open) {
        for (const caret of grid.querySelectorAll(".collapsible-data-grid-caret")) {
            collapsibleDataGridSetCaret(caret, open);
        }
    }

    function onCollapsibleDataGridCaretClick(event) {
        var caret = event.target.closest(".collapsible-data-grid-caret");

        collapsibleDataGridSetCaret(caret, !caret.classList.contains('caret-open'));
    }

    function onCollapsibleDataGridCollapseAll(event) {
        var selector = event.target.closest("[data-grid-selector]").getAttribute('data-grid-selector');

        collapsibleDataGridSetAllCarets(document.querySelector(selector), false);
    }

    function onCollapsibleDataGridExpandAll(event) {
        var selector = event.target.closest("[data-grid-selector]").getAttribute('data-grid-selector');

        collapsibleDataGridSetAllCarets(document.querySelector(selector), true);
    }

    function initTabBars() {
        for (const tabBarRoot of document.querySelectorAll(".tabbar")) {
            for (const tab of tabBarRoot.querySelectorAll(".tab")) {
                tab.addEventListener('click', onTabBarClick);
            }
        }
    }

    function onTabBarClick(event) {
        var tab = event.target.closest(".tab");

        if (tab.classList.contains("active")) {
            return;
        }

        var tabbar = tab.closest(".tabbar");

        for (const otherTab of tabbar.querySelectorAll(".tab")) {
            if (otherTab != tab) {
                otherTab.classList.remove("active");
            }
        }

        tab.classList.add("active");

        var context = tab.getAttribute("data-tab-context");
        var callback = tabbar.getAttribute("data-tab-callback");

        window[callback](context, tab);
    }

    function onViewSelected(idsString, tab) {
        for (var elem of document.querySelectorAll(".view-workitem-hidden, .view-workitem-faded")) {
            elem.classList.remove("view-workitem-hidden");
            elem.classList.remove("view-workitem-faded");
        }

        let grid = document.querySelector("#toc-grid");
        let list = document.querySelector("#toc-list");

        if (idsString == "all") {
            if (grid != null) collapsibleDataGridSetAllCarets(grid, false);
            if (list != null) collapsibleListSetAllCarets(list, false);

            return;
        }

        if (grid != null) collapsibleDataGridSetAllCarets(grid, true);
        if (list != null) collapsibleListSetAllCarets(list, true);

        var ids = new Set(idsString.split(",").map(id => id.trim()));

        for (const workItem of document.querySelectorAll("article.workitem")) {
            if (!ids.has(workItem.getAttribute("data-wi-id").trim())) {
                workItem.classList.add("view-workitem-hidden");
            }
        }

        var parentsFaded = new Set();
        for (const row of document.querySelectorAll("#toc-grid tr[data-grid-row-id]")) {
            var rowId = row.getAttribute("data-grid-row-id")?.trim();

            if (parentsFaded.has(rowId)) {
                continue;
            }

            if (!ids.has(rowId)) {
                row.classList.add("view-workitem-hidden");
            } else {
                var parentId = row.getAttribute("data-grid-parent-row-id")?.trim();

                while (parentId != null && parentId != "") {
                    if (ids.has(parentId) || parentsFaded.has(parentId)) {
                        break;
                    }

                    var parentRow = document.querySelector('#toc-grid tr[data-grid-row-id="' + parentId + '"]');

                    parentRow.classList.add("view-workitem-faded");
                    parentRow.classList.remove("view-workitem-hidden");

                    parentsFaded.add(parentId);

                    parentId = parentRow.getAttribute("data-grid-parent-row-id")?.trim();
                }
            }
        }

        for (const row of document.querySelectorAll("#toc-grid tr[data-grid-row-id]:has(.collapsible-data-grid-caret)")) {
            var rowId = row.getAttribute("data-grid-row-id")?.trim();
            var childRows = document.querySelectorAll('#toc-grid tr[data-grid-parent-row-id="' + rowId + '"]');

            var anyChildVisible = false;
            for (const childRow of childRows) {
                if (ids.has(childRow.getAttribute("data-grid-row-id")?.trim())) {
                    anyChildVisible = true;
                    break;
                }
            }

            if (!anyChildVisible) {
                row.querySelector(".collapsible-data-grid-caret").classList.add("view-workitem-hidden");
            }
        }
    }

    initCollapsibleLists();
    initCollapsibleDataGrids();
    initTabBars();
</script>
"##;

/// Document stylesheet: a typographic base plus the layout rules for the
/// table of contents, metadata grids, views and collapsible trees.
pub const STYLESHEET: &str = r#"
@media print {
    *, *:before, *:after {
        background: transparent !important;
        color: #000 !important;
        box-shadow: none !important;
        text-shadow: none !important;
    }

    a, a:visited { text-decoration: underline; }
    pre, blockquote { border: 1px solid #999; page-break-inside: avoid; }
    thead { display: table-header-group; }
    tr, img { page-break-inside: avoid; }
    img { max-width: 100% !important; }
    p, h2, h3 { orphans: 3; widows: 3; }
    h2, h3 { page-break-after: avoid; }
}

html {
    font-size: 12px;
    scroll-padding-top: 70px;
}

@media screen and (min-width: 32rem) and (max-width: 48rem) {
    html { font-size: 15px; }
}

@media screen and (min-width: 48rem) {
    html { font-size: 16px; }
}

body {
    line-height: 1.85;
    color: #444;
    font-family: 'Open Sans', Helvetica, sans-serif;
    font-weight: 300;
    text-align: left;
    margin: 0 0 1rem;
    max-width: 100%;
}

div.centered-layout {
    margin: 6rem auto 1rem;
    max-width: 48rem;
}

p { font-size: 1rem; margin-bottom: 1.3rem; color: #777; }

h1, h2, h3, h4 {
    margin: 1.414rem 0 .5rem;
    font-weight: inherit;
    line-height: 1.42;
}

h1 { margin-top: 0; font-size: 3.998rem; }
h2 { font-size: 2.827rem; }
h3 { font-size: 1.999rem; }
h4 { font-size: 1.414rem; }
small { font-size: .707em; }

img, canvas, iframe, video, svg, select, textarea { max-width: 100%; }

a, a:visited { color: #3498db; }
a:hover, a:focus, a:active { color: #2980b9; }

pre { background-color: #fafafa; padding: 1rem; text-align: left; }

blockquote {
    margin: 0;
    border-left: 5px solid #7a7a7a;
    font-style: italic;
    padding: 1.33em;
    text-align: left;
}

ul, ol, li { text-align: left; }

strong { font-weight: 700; }

hr.end-of-work-item {
    width: 100%;
    border: 0;
    height: 0px;
    background-image: linear-gradient(to right, rgba(0, 0, 0, 0), rgba(0, 0, 0, 0.15), rgba(0, 0, 0, 0));
    margin-top: 50px;
    margin-bottom: 50px;
}

.icon-small-button {
    fill: #c7c7c7;
    stroke: #c7c7c7;
    cursor: pointer;
    transition: 0.25s ease-in-out fill, 0.25s ease-in-out stroke;
}

.icon-small-button:hover {
    fill: #646464;
    stroke: #646464;
}

.collapsible-list .collapsible-list-caret,
.collapsible-data-grid .collapsible-data-grid-caret {
    fill: #c7c7c7;
    margin-left: -17px;
    cursor: pointer;
    transition: 0.25s ease-in-out transform, 0.25s ease-in-out fill;
}

.collapsible-list .collapsible-list-caret:hover,
.collapsible-data-grid .collapsible-data-grid-caret:hover {
    fill: #646464;
}

.collapsible-list .collapsible-list-caret.caret-open,
.collapsible-data-grid .collapsible-data-grid-caret.caret-open {
    transform: rotate(0deg);
}

.collapsible-list .collapsible-list-caret.caret-closed,
.collapsible-data-grid .collapsible-data-grid-caret.caret-closed {
    transform: rotate(-90deg);
}

.collapsible-list ul.children-closed { display: none; }
.collapsible-data-grid tr.parent-closed { display: none; }

article > h1, article > h2, article > h3, article > h4, article > h5 {
    margin-top: 0;
    word-break: break-word;
}

section[data-wi-field-name] img {
    border-radius: 0;
    max-width: 100%;
    height: auto;
    width: auto;
}

section.workitem-metadata {
    box-sizing: border-box;
    margin-bottom: 15px;
}

section.workitem-metadata table {
    table-layout: fixed;
    width: 100%;
    border-collapse: collapse;
    background-color: rgb(248, 248, 248);
    border-top: 1px solid rgba(234, 234, 234, 1);
    border-bottom: 1px solid rgba(234, 234, 234, 1);
}

section.workitem-metadata > table tr td {
    vertical-align: top;
    padding: 3px 8px;
}

section.workitem-metadata > table tr td > section { margin: 0; }
section.workitem-metadata > table tr td > section > strong { margin-right: 10px; }
section.workitem-metadata > table tr td > section > p { margin: 0; }

.state-indicator {
    display: inline-block;
    width: 10px;
    height: 10px;
    border-radius: 50%;
}

table.data-grid {
    table-layout: auto;
    width: 100%;
}

table.data-grid tr:hover { background-color: rgb(244, 244, 244); }

table.data-grid tr td, table.data-grid tr th {
    overflow: hidden;
    text-overflow: ellipsis;
    white-space: nowrap;
    padding: 3px 5px;
    max-width: 0;
}

.views { text-align: center; }

.views a.tab {
    display: inline-block;
    padding: 10px 8px;
    color: rgba(0, 0, 0, 0.9);
    cursor: pointer;
    margin-bottom: 10px;
    margin-right: 10px;
    border-bottom: 2px solid transparent;
    transition: color ease-in-out 0.25s, background-color ease-in-out 0.25s;
}

.views a.active {
    font-weight: 600;
    border-bottom: 2px solid rgba(0, 120, 212, 1);
}

.view-workitem-hidden {
    display: none;
    visibility: hidden;
}

.view-workitem-faded { opacity: 0.3; }

a#back-to-top {
    position: fixed;
    bottom: 10px;
    right: 20px;
    opacity: 0.1;
    transition: opacity ease-in-out 0.25s;
    cursor: pointer;
}

a#back-to-top:hover { opacity: 0.5; }

header h1 {
    text-align: center;
    margin-top: 40px;
}

.padding-body { margin: 0 2rem; }

section.appendix { margin: 0 0 4rem; }

.from-markdown table {
    table-layout: auto;
    width: 100%;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn type_icons_use_css_slugs() {
        assert_eq!(
            type_icon("User Story", 13),
            "<span class=\"icon icon-wi-user-story\" style=\"width: 13px; height: 13px\"></span> "
        );
    }

    #[test]
    fn svg_encoding_escapes_css_breaking_characters() {
        let encoded = encode_svg("<svg fill=\"#000\"/>");
        assert!(!encoded.contains('<'));
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains('#'));
        assert_eq!(encoded, "%3Csvg%20fill%3D%22%23000%22%2F%3E");
    }
}
