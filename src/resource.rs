use std::fmt;
use std::str::FromStr;

use crate::bulk::BulkAction;
use crate::column::{CellValue, ColumnDescriptor, Tone, money, status_badge};
use crate::domain::AdminError;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn text(name: &'static str, label: &'static str, required: bool) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Text,
        required,
    }
}

const fn number(name: &'static str, label: &'static str, required: bool) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Number,
        required,
    }
}

const fn date(name: &'static str, label: &'static str, required: bool) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Date,
        required,
    }
}

const fn choice(
    name: &'static str,
    label: &'static str,
    options: &'static [&'static str],
) -> FormField {
    FormField {
        name,
        label,
        kind: FieldKind::Choice(options),
        required: true,
    }
}

/// Status transition offered in the detail view, e.g. "Mark as Replied".
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub value: &'static str,
    pub label: &'static str,
}

pub struct ResourceSchema {
    pub key: &'static str,
    pub title: &'static str,
    pub api_path: &'static str,
    pub searchable: &'static [&'static str],
    pub status_field: Option<&'static str>,
    pub category_field: Option<&'static str>,
    pub date_field: Option<&'static str>,
    pub location_field: Option<&'static str>,
    pub amount_field: Option<&'static str>,
    pub bulk_actions: &'static [BulkAction],
    pub form: &'static [FormField],
    pub completion: Option<Completion>,
    columns: fn() -> Vec<ColumnDescriptor>,
}

impl ResourceSchema {
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        (self.columns)()
    }

    pub fn offers(&self, action: BulkAction) -> bool {
        self.bulk_actions.contains(&action)
    }

    pub fn form_field(&self, name: &str) -> Option<&FormField> {
        self.form.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Articles,
    Books,
    Events,
    Registrations,
    Sermons,
    Donations,
    Contacts,
    Members,
    PrayerRequests,
    Customers,
    Invoices,
}

impl Resource {
    pub const ALL: [Resource; 11] = [
        Resource::Articles,
        Resource::Books,
        Resource::Events,
        Resource::Registrations,
        Resource::Sermons,
        Resource::Donations,
        Resource::Contacts,
        Resource::Members,
        Resource::PrayerRequests,
        Resource::Customers,
        Resource::Invoices,
    ];

    pub fn schema(&self) -> &'static ResourceSchema {
        match self {
            Resource::Articles => &ARTICLES,
            Resource::Books => &BOOKS,
            Resource::Events => &EVENTS,
            Resource::Registrations => &REGISTRATIONS,
            Resource::Sermons => &SERMONS,
            Resource::Donations => &DONATIONS,
            Resource::Contacts => &CONTACTS,
            Resource::Members => &MEMBERS,
            Resource::PrayerRequests => &PRAYER_REQUESTS,
            Resource::Customers => &CUSTOMERS,
            Resource::Invoices => &INVOICES,
        }
    }

    pub fn key(&self) -> &'static str {
        self.schema().key
    }

    pub fn next(&self) -> Resource {
        let idx = Self::ALL.iter().position(|r| r == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn previous(&self) -> Resource {
        let idx = Self::ALL.iter().position(|r| r == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema().title)
    }
}

impl FromStr for Resource {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Resource::ALL
            .iter()
            .find(|r| {
                let schema = r.schema();
                schema.key.to_lowercase() == wanted
                    || schema.title.replace(' ', "").to_lowercase() == wanted
            })
            .copied()
            .ok_or_else(|| AdminError::UnknownResource(s.to_string()))
    }
}

const PUBLISHING: &[BulkAction] = &[
    BulkAction::Publish,
    BulkAction::Unpublish,
    BulkAction::Delete,
    BulkAction::Export,
];
const COMPLETING: &[BulkAction] = &[
    BulkAction::MarkCompleted,
    BulkAction::Delete,
    BulkAction::Export,
];
const BASIC: &[BulkAction] = &[BulkAction::Delete, BulkAction::Export];

const PUBLISH_STATES: &[&str] = &["draft", "published"];

fn title_with_status(r: &Record) -> CellValue {
    CellValue::Composite(vec![CellValue::text(r.text("title")), status_badge(r)])
}

fn invoice_number(r: &Record) -> CellValue {
    let kind = r.text("kind");
    let badge = if kind.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Badge {
            label: kind,
            tone: Tone::Info,
        }
    };
    CellValue::Composite(vec![CellValue::text(r.text("number")), badge])
}

fn amount(r: &Record) -> CellValue {
    money(r, "amount")
}

fn price(r: &Record) -> CellValue {
    money(r, "price")
}

static ARTICLES: ResourceSchema = ResourceSchema {
    key: "articles",
    title: "Articles",
    api_path: "/api/articles",
    searchable: &["title", "author", "category"],
    status_field: Some("status"),
    category_field: Some("category"),
    date_field: Some("date"),
    location_field: None,
    amount_field: None,
    bulk_actions: PUBLISHING,
    form: &[
        text("title", "Title", true),
        text("author", "Author", true),
        text("category", "Category", false),
        choice("status", "Status", PUBLISH_STATES),
        date("date", "Date", false),
        text("content", "Content", false),
    ],
    completion: None,
    columns: articles_columns,
};

fn articles_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Title", "title").width(32),
        ColumnDescriptor::field("Author", "author"),
        ColumnDescriptor::field("Category", "category"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
        ColumnDescriptor::field("Date", "date"),
    ]
}

static BOOKS: ResourceSchema = ResourceSchema {
    key: "books",
    title: "Books",
    api_path: "/api/books",
    searchable: &["title", "author", "isbn"],
    status_field: Some("status"),
    category_field: Some("category"),
    date_field: None,
    location_field: None,
    amount_field: None,
    bulk_actions: BASIC,
    form: &[
        text("title", "Title", true),
        text("author", "Author", true),
        text("isbn", "ISBN", false),
        text("category", "Category", false),
        number("price", "Price", true),
        number("stock", "Stock", false),
        choice("status", "Status", &["available", "out_of_stock"]),
    ],
    completion: None,
    columns: books_columns,
};

fn books_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Title", "title").width(32),
        ColumnDescriptor::field("Author", "author"),
        ColumnDescriptor::field("Category", "category"),
        ColumnDescriptor::computed("Price", price).class_name("numeric"),
        ColumnDescriptor::field("Stock", "stock").class_name("numeric"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static EVENTS: ResourceSchema = ResourceSchema {
    key: "events",
    title: "Events",
    api_path: "/api/events",
    searchable: &["title", "location", "category"],
    status_field: Some("status"),
    category_field: Some("category"),
    date_field: Some("date"),
    location_field: Some("location"),
    amount_field: None,
    bulk_actions: PUBLISHING,
    form: &[
        text("title", "Title", true),
        date("date", "Date", true),
        text("time", "Time", false),
        text("location", "Location", true),
        text("category", "Category", false),
        choice("status", "Status", PUBLISH_STATES),
        text("description", "Description", false),
    ],
    completion: None,
    columns: events_columns,
};

fn events_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::computed("Event", title_with_status).width(36),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::field("Location", "location"),
        ColumnDescriptor::field("Category", "category"),
    ]
}

static REGISTRATIONS: ResourceSchema = ResourceSchema {
    key: "registrations",
    title: "Registrations",
    api_path: "/api/registrations",
    searchable: &["name", "email", "eventId"],
    status_field: Some("status"),
    category_field: Some("eventId"),
    date_field: Some("date"),
    location_field: None,
    amount_field: None,
    bulk_actions: COMPLETING,
    form: &[
        text("name", "Name", true),
        text("email", "Email", true),
        text("eventId", "Event", true),
        number("tickets", "Tickets", false),
        date("date", "Date", false),
        choice("status", "Status", &["pending", "confirmed"]),
    ],
    completion: Some(Completion {
        value: "confirmed",
        label: "Mark as Confirmed",
    }),
    columns: registrations_columns,
};

fn registrations_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Name", "name"),
        ColumnDescriptor::field("Email", "email"),
        ColumnDescriptor::field("Event", "eventId"),
        ColumnDescriptor::field("Tickets", "tickets").class_name("numeric"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static SERMONS: ResourceSchema = ResourceSchema {
    key: "sermons",
    title: "Sermons",
    api_path: "/api/sermons",
    searchable: &["title", "preacher", "series", "scripture"],
    status_field: Some("status"),
    category_field: Some("series"),
    date_field: Some("date"),
    location_field: None,
    amount_field: None,
    bulk_actions: PUBLISHING,
    form: &[
        text("title", "Title", true),
        text("preacher", "Preacher", true),
        text("series", "Series", false),
        text("scripture", "Scripture", false),
        date("date", "Date", true),
        choice("status", "Status", PUBLISH_STATES),
    ],
    completion: None,
    columns: sermons_columns,
};

fn sermons_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Title", "title").width(32),
        ColumnDescriptor::field("Preacher", "preacher"),
        ColumnDescriptor::field("Series", "series"),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static DONATIONS: ResourceSchema = ResourceSchema {
    key: "donations",
    title: "Donations",
    api_path: "/api/donations",
    searchable: &["donor", "email", "fund"],
    status_field: Some("status"),
    category_field: Some("fund"),
    date_field: Some("date"),
    location_field: None,
    amount_field: Some("amount"),
    bulk_actions: BASIC,
    form: &[
        text("donor", "Donor", true),
        text("email", "Email", false),
        number("amount", "Amount", true),
        text("fund", "Fund", false),
        text("method", "Method", false),
        date("date", "Date", true),
        choice("status", "Status", &["pending", "completed"]),
    ],
    completion: None,
    columns: donations_columns,
};

fn donations_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Donor", "donor"),
        ColumnDescriptor::computed("Amount", amount).class_name("numeric"),
        ColumnDescriptor::field("Fund", "fund"),
        ColumnDescriptor::field("Method", "method"),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static CONTACTS: ResourceSchema = ResourceSchema {
    key: "contacts",
    title: "Contacts",
    api_path: "/api/contacts",
    searchable: &["name", "email", "subject"],
    status_field: Some("status"),
    category_field: None,
    date_field: Some("date"),
    location_field: None,
    amount_field: None,
    bulk_actions: COMPLETING,
    form: &[
        text("name", "Name", true),
        text("email", "Email", true),
        text("subject", "Subject", false),
        text("message", "Message", true),
        date("date", "Date", false),
        choice("status", "Status", &["new", "replied"]),
    ],
    completion: Some(Completion {
        value: "replied",
        label: "Mark as Replied",
    }),
    columns: contacts_columns,
};

fn contacts_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Name", "name"),
        ColumnDescriptor::field("Email", "email"),
        ColumnDescriptor::field("Subject", "subject").width(30),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static MEMBERS: ResourceSchema = ResourceSchema {
    key: "members",
    title: "Members",
    api_path: "/api/members",
    searchable: &["name", "email", "phone"],
    status_field: Some("status"),
    category_field: Some("ministry"),
    date_field: Some("joined"),
    location_field: Some("country"),
    amount_field: None,
    bulk_actions: BASIC,
    form: &[
        text("name", "Name", true),
        text("email", "Email", true),
        text("phone", "Phone", false),
        text("ministry", "Ministry", false),
        text("country", "Country", false),
        date("joined", "Joined", false),
        choice("status", "Status", &["active", "inactive"]),
    ],
    completion: None,
    columns: members_columns,
};

fn members_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Name", "name"),
        ColumnDescriptor::field("Email", "email"),
        ColumnDescriptor::field("Phone", "phone"),
        ColumnDescriptor::field("Ministry", "ministry"),
        ColumnDescriptor::field("Country", "country"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static PRAYER_REQUESTS: ResourceSchema = ResourceSchema {
    key: "prayerRequests",
    title: "Prayer Requests",
    api_path: "/api/prayer-requests",
    searchable: &["name", "request"],
    status_field: Some("status"),
    category_field: None,
    date_field: Some("date"),
    location_field: None,
    amount_field: None,
    bulk_actions: COMPLETING,
    form: &[
        text("name", "Name", true),
        text("email", "Email", false),
        text("request", "Request", true),
        date("date", "Date", false),
        choice("status", "Status", &["pending", "prayed"]),
    ],
    completion: Some(Completion {
        value: "prayed",
        label: "Mark as Prayed",
    }),
    columns: prayer_requests_columns,
};

fn prayer_requests_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Name", "name"),
        ColumnDescriptor::field("Request", "request").width(40),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}

static CUSTOMERS: ResourceSchema = ResourceSchema {
    key: "customers",
    title: "Customers",
    api_path: "/api/customers",
    searchable: &["name", "email", "company"],
    status_field: None,
    category_field: None,
    date_field: None,
    location_field: Some("country"),
    amount_field: None,
    bulk_actions: BASIC,
    form: &[
        text("name", "Name", true),
        text("email", "Email", true),
        text("company", "Company", false),
        text("phone", "Phone", false),
        text("address", "Address", false),
        text("country", "Country", false),
    ],
    completion: None,
    columns: customers_columns,
};

fn customers_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::field("Name", "name"),
        ColumnDescriptor::field("Company", "company"),
        ColumnDescriptor::field("Email", "email"),
        ColumnDescriptor::field("Phone", "phone"),
        ColumnDescriptor::field("Country", "country"),
    ]
}

static INVOICES: ResourceSchema = ResourceSchema {
    key: "invoices",
    title: "Invoices",
    api_path: "/api/invoices",
    searchable: &["number", "customer", "customerId"],
    status_field: Some("status"),
    category_field: Some("kind"),
    date_field: Some("date"),
    location_field: None,
    amount_field: Some("amount"),
    bulk_actions: COMPLETING,
    form: &[
        text("number", "Number", true),
        choice("kind", "Type", &["invoice", "estimate", "receipt"]),
        text("customer", "Customer", true),
        text("customerId", "Customer Id", false),
        number("amount", "Amount", true),
        date("date", "Date", true),
        date("due", "Due", false),
        choice("status", "Status", &["draft", "sent", "paid"]),
    ],
    completion: Some(Completion {
        value: "paid",
        label: "Mark as Paid",
    }),
    columns: invoices_columns,
};

fn invoices_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::computed("Number", invoice_number),
        ColumnDescriptor::field("Customer", "customer"),
        ColumnDescriptor::computed("Amount", amount).class_name("numeric"),
        ColumnDescriptor::field("Date", "date"),
        ColumnDescriptor::computed("Status", status_badge).class_name("badge"),
    ]
}
