use crate::domain::schema::{ParamSpec, ToolSchema};

const SEARCH_QUERY_HELP: &str = concat!(
    "Search query: plain text (e.g. 'project documentation') or a CQL query string. ",
    "CQL examples:\n",
    "- Basic search: 'type=page AND space=DEV'\n",
    "- Personal space: 'space=\"~username\"' (personal space keys must be quoted)\n",
    "- By title: 'title~\"Meeting Notes\"'\n",
    "- Recent content: 'created >= \"2023-01-01\"'\n",
    "- By label: 'label=documentation'\n",
    "- Your recent edits: 'contributor = currentUser() AND lastModified > startOfWeek()'\n",
    "Personal space keys, reserved words and numeric identifiers need quoting in CQL."
);

pub fn tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::read(
            "confluence_search",
            "Search Confluence content using simple terms or CQL",
        )
        .required(ParamSpec::string("query", SEARCH_QUERY_HELP))
        .optional(
            ParamSpec::number("limit", "Maximum number of results (1-50)")
                .default(10)
                .bounds(1, 50),
        )
        .optional(ParamSpec::string(
            "spaces_filter",
            "Comma-separated space keys to restrict results to. Overrides CONFLUENCE_SPACES_FILTER when provided.",
        )),
        ToolSchema::read(
            "confluence_get_page",
            "Get content of a specific Confluence page by ID",
        )
        .required(ParamSpec::string(
            "page_id",
            "Confluence page ID (numeric, found in the page URL, e.g. '123456789')",
        ))
        .optional(
            ParamSpec::boolean(
                "include_metadata",
                "Whether to include page metadata such as creation date, last update, version and labels",
            )
            .default(true),
        )
        .optional(
            ParamSpec::boolean(
                "convert_to_markdown",
                "Convert the page body to plain readable text (true) or keep raw storage markup (false). Raw markup exposes macros but costs far more tokens.",
            )
            .default(true),
        ),
        ToolSchema::read(
            "confluence_get_page_children",
            "Get child pages of a specific Confluence page",
        )
        .required(ParamSpec::string(
            "parent_id",
            "ID of the parent page whose children to retrieve",
        ))
        .optional(
            ParamSpec::string(
                "expand",
                "Fields to expand in the response (e.g. 'version', 'body.storage')",
            )
            .default("version"),
        )
        .optional(
            ParamSpec::number("limit", "Maximum number of child pages to return (1-50)")
                .default(25)
                .bounds(1, 50),
        )
        .optional(
            ParamSpec::boolean("include_content", "Whether to include page bodies in the response")
                .default(false),
        )
        .optional(
            ParamSpec::number("start", "Starting index for pagination (0-based)")
                .default(0)
                .at_least(0),
        )
        .optional(
            ParamSpec::boolean(
                "convert_to_markdown",
                "Convert included page bodies to plain readable text",
            )
            .default(true),
        ),
        ToolSchema::read(
            "confluence_get_page_ancestors",
            "Get ancestor (parent) pages of a specific Confluence page",
        )
        .required(ParamSpec::string(
            "page_id",
            "ID of the page whose ancestors to retrieve",
        )),
        ToolSchema::read(
            "confluence_get_comments",
            "Get comments for a specific Confluence page",
        )
        .required(ParamSpec::string(
            "page_id",
            "Confluence page ID (numeric, found in the page URL)",
        )),
        ToolSchema::write("confluence_create_page", "Create a new Confluence page")
            .required(ParamSpec::string(
                "space_key",
                "Key of the space to create the page in (usually a short uppercase code like 'DEV')",
            ))
            .required(ParamSpec::string("title", "Title of the page"))
            .required(ParamSpec::string(
                "content",
                "Page content in Markdown or storage markup",
            ))
            .optional(ParamSpec::string(
                "parent_id",
                "Optional parent page ID; the new page is created as its child",
            )),
        ToolSchema::write("confluence_update_page", "Update an existing Confluence page")
            .required(ParamSpec::string("page_id", "ID of the page to update"))
            .required(ParamSpec::string("title", "New title of the page"))
            .required(ParamSpec::string(
                "content",
                "New page content in Markdown or storage markup",
            ))
            .optional(ParamSpec::boolean("is_minor_edit", "Whether this is a minor edit").default(false))
            .optional(ParamSpec::string("version_comment", "Optional comment for this version").default("")),
        ToolSchema::write("confluence_delete_page", "Delete an existing Confluence page")
            .destructive()
            .required(ParamSpec::string("page_id", "ID of the page to delete")),
        ToolSchema::write("confluence_attach_content", "Attach content to a Confluence page")
            .required(ParamSpec::binary("content", "Content to attach"))
            .required(ParamSpec::string("name", "File name of the attachment"))
            .required(ParamSpec::string("page_id", "ID of the page to attach the content to")),
    ]
}
