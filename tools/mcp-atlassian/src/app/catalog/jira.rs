use crate::domain::schema::{ParamSpec, ToolSchema};
use serde_json::Value;

pub const ESSENTIAL_FIELDS: &str =
    "summary,description,status,assignee,reporter,labels,priority,created,updated,issuetype";

const JQL_HELP: &str = concat!(
    "JQL query string. Examples:\n",
    "- Epics: \"issuetype = Epic AND project = PROJ\"\n",
    "- Issues in an epic: \"parent = PROJ-123\"\n",
    "- By status: \"status = 'In Progress' AND project = PROJ\"\n",
    "- Mine: \"assignee = currentUser()\"\n",
    "- Recently updated: \"updated >= -7d AND project = PROJ\""
);

const ADDITIONAL_FIELDS_HELP: &str = concat!(
    "Optional JSON object (as a string) of extra fields. Examples:\n",
    "- Priority: {\"priority\": {\"name\": \"High\"}}\n",
    "- Labels: {\"labels\": [\"frontend\", \"urgent\"]}\n",
    "- Parent: {\"parent\": \"PROJ-123\"}\n",
    "- Custom field: {\"customfield_10010\": \"value\"}"
);

fn issue_key() -> ParamSpec {
    ParamSpec::string("issue_key", "Jira issue key (e.g. 'PROJ-123')")
}

fn limit() -> ParamSpec {
    ParamSpec::number("limit", "Maximum number of results (1-50)")
        .default(10)
        .bounds(1, 50)
}

fn start_at() -> ParamSpec {
    ParamSpec::number("startAt", "Starting index for pagination (0-based)")
        .default(0)
        .at_least(0)
}

fn fields(default: &'static str) -> ParamSpec {
    ParamSpec::string(
        "fields",
        "Comma-separated fields to return. Use '*all' for every field including custom fields",
    )
    .default(default)
}

pub fn tools() -> Vec<ToolSchema> {
    vec![
        ToolSchema::read(
            "jira_get_issue",
            "Get details of a specific Jira issue including its Epic links and relationship information",
        )
        .required(issue_key())
        .optional(fields(ESSENTIAL_FIELDS))
        .optional(
            ParamSpec::string(
                "expand",
                "Optional fields to expand, e.g. 'renderedFields', 'transitions', 'changelog'",
            )
            .default(Value::Null),
        )
        .optional(
            ParamSpec::integer(
                "comment_limit",
                "Maximum number of comments to include (0 for no comments)",
            )
            .default(10)
            .bounds(0, 100),
        )
        .optional(
            ParamSpec::string("properties", "Comma-separated list of issue properties to return")
                .default(Value::Null),
        )
        .optional(
            ParamSpec::boolean(
                "update_history",
                "Whether to update the issue view history for the requesting user",
            )
            .default(true),
        ),
        ToolSchema::read("jira_search", "Search Jira issues using JQL (Jira Query Language)")
            .required(ParamSpec::string("jql", JQL_HELP))
            .optional(fields(ESSENTIAL_FIELDS))
            .optional(limit())
            .optional(start_at())
            .optional(ParamSpec::string(
                "projects_filter",
                "Comma-separated project keys to restrict results to. Overrides JIRA_PROJECTS_FILTER when provided.",
            )),
        ToolSchema::read(
            "jira_get_project_issues",
            "Get all issues for a specific Jira project",
        )
        .required(ParamSpec::string("project_key", "The project key"))
        .optional(limit())
        .optional(start_at()),
        ToolSchema::read(
            "jira_get_epic_issues",
            "Get all issues linked to a specific epic",
        )
        .required(ParamSpec::string("epic_key", "Key of the epic (e.g. 'PROJ-123')"))
        .optional(limit())
        .optional(start_at()),
        ToolSchema::read(
            "jira_get_transitions",
            "Get available status transitions for a Jira issue",
        )
        .required(issue_key()),
        ToolSchema::read("jira_get_worklog", "Get worklog entries for a Jira issue")
            .required(issue_key()),
        ToolSchema::read(
            "jira_download_attachments",
            "Download attachments from a Jira issue",
        )
        .required(issue_key())
        .required(ParamSpec::string(
            "target_dir",
            "Directory where attachments should be saved",
        )),
        ToolSchema::read(
            "jira_get_agile_boards",
            "Get Jira agile boards by name, project key, or type",
        )
        .optional(ParamSpec::string("board_name", "Board name, fuzzy matched"))
        .optional(ParamSpec::string("project_key", "Jira project key (e.g. 'PROJ')"))
        .optional(ParamSpec::string("board_type", "Board type (e.g. 'scrum', 'kanban')"))
        .optional(ParamSpec::number("startAt", "Starting index for pagination (0-based)").default(0))
        .optional(limit()),
        ToolSchema::read(
            "jira_get_board_issues",
            "Get all issues linked to a specific board",
        )
        .required(ParamSpec::string("board_id", "Board id (e.g. '1001')"))
        .required(ParamSpec::string("jql", JQL_HELP))
        .optional(fields("*all"))
        .optional(start_at())
        .optional(limit())
        .optional(
            ParamSpec::string(
                "expand",
                "Fields to expand in the response (e.g. 'version', 'body.storage')",
            )
            .default("version"),
        ),
        ToolSchema::read(
            "jira_get_sprints_from_board",
            "Get Jira sprints from a board by state",
        )
        .optional(ParamSpec::string("board_id", "Board id (e.g. '1000')"))
        .optional(ParamSpec::string(
            "state",
            "Sprint state ('active', 'future', 'closed'); defaults to active",
        ))
        .optional(start_at())
        .optional(limit()),
        ToolSchema::read("jira_get_sprint_issues", "Get Jira issues from a sprint")
            .required(ParamSpec::string("sprint_id", "Sprint id (e.g. '10001')"))
            .optional(fields("*all"))
            .optional(start_at())
            .optional(limit()),
        ToolSchema::write(
            "jira_create_issue",
            "Create a new Jira issue with optional Epic link or parent for subtasks",
        )
        .required(ParamSpec::string(
            "project_key",
            "Project key (e.g. 'PROJ'); the prefix of issue keys in the project",
        ))
        .required(ParamSpec::string("summary", "Summary/title of the issue"))
        .required(ParamSpec::string(
            "issue_type",
            "Issue type (e.g. 'Task', 'Bug', 'Story', 'Epic', 'Subtask'). Subtasks need a parent in additional_fields",
        ))
        .optional(
            ParamSpec::string("assignee", "Assignee (account id, full name or e-mail)")
                .default(Value::Null),
        )
        .optional(ParamSpec::string("description", "Issue description").default(""))
        .optional(
            ParamSpec::string(
                "components",
                "Comma-separated component names (e.g. 'Frontend,API')",
            )
            .default(""),
        )
        .optional(ParamSpec::string("additional_fields", ADDITIONAL_FIELDS_HELP).default("{}")),
        ToolSchema::write(
            "jira_update_issue",
            "Update an existing Jira issue: fields, status-related fields, epic links and attachments",
        )
        .required(issue_key())
        .required(ParamSpec::string(
            "fields",
            "JSON object (as a string) of fields to update, e.g. '{\"summary\": \"New title\", \"priority\": {\"name\": \"High\"}}'",
        ))
        .optional(
            ParamSpec::string(
                "additional_fields",
                "Optional JSON object (as a string) of extra fields, e.g. custom fields",
            )
            .default("{}"),
        )
        .optional(ParamSpec::string(
            "attachments",
            "File paths to attach: a JSON array string or a comma-separated list, e.g. '/tmp/a.txt,/tmp/b.txt'",
        )),
        ToolSchema::write("jira_delete_issue", "Delete an existing Jira issue")
            .destructive()
            .required(issue_key()),
        ToolSchema::write("jira_add_comment", "Add a comment to a Jira issue")
            .required(issue_key())
            .required(ParamSpec::string("comment", "Comment text in Markdown format")),
        ToolSchema::write("jira_add_worklog", "Add a worklog entry to a Jira issue")
            .required(issue_key())
            .required(ParamSpec::string(
                "time_spent",
                "Time spent in Jira format, e.g. '1h 30m', '1d', '30m'",
            ))
            .optional(ParamSpec::string("comment", "Optional worklog comment"))
            .optional(ParamSpec::string(
                "started",
                "Optional start time in ISO format, e.g. '2023-08-01T12:00:00.000+0000'; defaults to now",
            )),
        ToolSchema::write("jira_link_to_epic", "Link an existing issue to an epic")
            .required(ParamSpec::string("issue_key", "Key of the issue to link (e.g. 'PROJ-123')"))
            .required(ParamSpec::string("epic_key", "Key of the epic to link to (e.g. 'PROJ-456')")),
        ToolSchema::write("jira_transition_issue", "Transition a Jira issue to a new status")
            .required(issue_key())
            .required(ParamSpec::string(
                "transition_id",
                "Transition to perform; ids come from jira_get_transitions (e.g. '11', '21'). A transition name is also accepted",
            ))
            .optional(
                ParamSpec::string(
                    "fields",
                    "JSON object (as a string) of fields required by the transition, e.g. '{\"resolution\": {\"name\": \"Fixed\"}}'",
                )
                .default("{}"),
            )
            .optional(ParamSpec::string(
                "comment",
                "Comment to add during the transition",
            )),
    ]
}
