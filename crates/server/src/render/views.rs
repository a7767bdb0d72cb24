//! Template views and page templates.

use askama::Template;
use askama_web::WebTemplate;
use serde::Deserialize;

use product_stream_core::Product;

use crate::delivery::Strategy;

/// Title shared by every listing page.
pub const LISTING_TITLE: &str = "Listado de productos";

/// Product view for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub created_at: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product
                .id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            name: product.name.to_string(),
            price: product.price.to_string(),
            created_at: product
                .created_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

/// One-line status message shown above a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: &'static str,
    pub message: String,
}

/// `?success=` / `?error=` indicators carried by redirects to a listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl ListingQuery {
    /// The notice to display; an error wins over a success message.
    #[must_use]
    pub fn into_notice(self) -> Option<Notice> {
        match (self.error, self.success) {
            (Some(message), _) => Some(Notice {
                kind: "error",
                message,
            }),
            (None, Some(message)) => Some(Notice {
                kind: "success",
                message,
            }),
            (None, None) => None,
        }
    }
}

/// Everything a streamed listing needs before its first row.
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub title: String,
    pub notice: Option<Notice>,
}

impl PageHeader {
    #[must_use]
    pub fn listing(notice: Option<Notice>) -> Self {
        Self {
            title: LISTING_TITLE.to_string(),
            notice,
        }
    }

    #[must_use]
    pub fn head(&self, strategy: Strategy) -> ListingHead<'_> {
        ListingHead {
            title: &self.title,
            notice: self.notice.as_ref(),
            strategy: strategy.as_str(),
        }
    }
}

/// Fully materialized listing page.
#[derive(Template, WebTemplate)]
#[template(path = "listar.html")]
pub struct ListingTemplate {
    pub title: String,
    pub notice: Option<Notice>,
    pub products: Vec<ProductView>,
    pub strategy: &'static str,
}

/// Document head up to the opening `<tbody>`.
#[derive(Template)]
#[template(path = "partials/listing_head.html")]
pub struct ListingHead<'a> {
    pub title: &'a str,
    pub notice: Option<&'a Notice>,
    pub strategy: &'static str,
}

/// A single `<tr>` for one product.
#[derive(Template)]
#[template(path = "partials/product_row.html")]
pub struct ProductRow<'a> {
    pub product: &'a ProductView,
}

/// Closes the table and the document.
#[derive(Template)]
#[template(path = "partials/listing_tail.html")]
pub struct ListingTail;

/// Create/edit form.
#[derive(Template, WebTemplate)]
#[template(path = "form.html")]
pub struct FormTemplate {
    pub title: String,
    pub button: String,
    pub id: Option<String>,
    pub name: String,
    pub price: String,
    pub errors: Vec<String>,
}

impl FormTemplate {
    /// Form for a new product.
    #[must_use]
    pub fn create() -> Self {
        Self {
            title: "Formulario de producto".to_string(),
            button: "Crear".to_string(),
            id: None,
            name: String::new(),
            price: String::new(),
            errors: Vec::new(),
        }
    }

    /// Form pre-filled with an existing product.
    #[must_use]
    pub fn edit(product: &Product) -> Self {
        Self {
            title: "Editar producto".to_string(),
            button: "Guardar".to_string(),
            id: product.id.as_ref().map(ToString::to_string),
            name: product.name.to_string(),
            price: product.price.to_string(),
            errors: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use product_stream_core::{Price, ProductId, ProductName};

    use super::*;

    fn televisor() -> Product {
        let mut product = Product::new(
            ProductName::parse("Televisor").unwrap(),
            Price::from_cents(45689).unwrap(),
        );
        product.id = Some(ProductId::new("abc123"));
        product
    }

    #[test]
    fn test_query_error_wins() {
        let query = ListingQuery {
            success: Some("saved".into()),
            error: Some("missing".into()),
        };
        let notice = query.into_notice().unwrap();
        assert_eq!(notice.kind, "error");
        assert_eq!(notice.message, "missing");

        assert!(ListingQuery::default().into_notice().is_none());
    }

    #[test]
    fn test_row_escapes_and_links() {
        let mut product = televisor();
        product.name = ProductName::parse("<b>TV</b>").unwrap();
        let view = ProductView::from(&product);

        let html = ProductRow { product: &view }.render().unwrap();
        assert!(html.contains(r#"class="product""#));
        assert!(html.contains("/form/abc123"));
        assert!(html.contains("/eliminar/abc123"));
        assert!(html.contains("456.89"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_listing_template_renders_every_row() {
        let products = vec![ProductView::from(&televisor()); 3];
        let html = ListingTemplate {
            title: LISTING_TITLE.to_string(),
            notice: Some(Notice {
                kind: "success",
                message: "Producto guardado".into(),
            }),
            products,
            strategy: Strategy::Full.as_str(),
        }
        .render()
        .unwrap();

        assert_eq!(html.matches(r#"<tr class="product""#).count(), 3);
        assert!(html.contains("Producto guardado"));
        assert!(html.contains(LISTING_TITLE));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_edit_form_prefills() {
        let html = FormTemplate::edit(&televisor()).render().unwrap();
        assert!(html.contains(r#"value="Televisor""#));
        assert!(html.contains(r#"value="456.89""#));
        assert!(html.contains("abc123"));
    }
}
