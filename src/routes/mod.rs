pub mod admin;
pub mod ai;
pub mod auth;
pub mod blog;
pub mod cabinet;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod contact;
pub mod health;
pub mod orders;
pub mod partners;
pub mod seo;
pub mod storefront;
pub mod warehouse;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Crawler and health endpoints served at the site root.
pub fn root_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/sitemap.xml", get(seo::sitemap_xml))
        .route("/robots.txt", get(seo::robots_txt))
}

/// Build the API router with all routes (mounted under `/api`)
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Storefront
        .route("/home", get(storefront::home))
        .route("/site", get(storefront::site))
        .route("/products", get(storefront::list_products))
        .route("/products/:id", get(storefront::get_product))
        .route("/categories", get(storefront::list_categories))
        .route("/categories/:slug", get(storefront::get_category))
        // Cart
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:product_id",
            put(cart::update_item).delete(cart::remove_item),
        )
        // Checkout
        .route("/checkout", post(checkout::create_checkout))
        .route("/checkout/success", get(checkout::checkout_success))
        .route("/checkout/cancel", get(checkout::checkout_cancel))
        .route("/webhooks/stripe", post(checkout::stripe_webhook))
        // Chat, blog and contact form
        .route("/chat", post(ai::chat))
        .route("/blog", get(blog::list_posts))
        .route("/blog/:slug", get(blog::get_post))
        .route("/contact", post(contact::submit))
        // Accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/register/b2b", post(auth::register_b2b))
        .route("/auth/login", post(auth::login))
        .route("/auth/check-vat", post(auth::check_vat))
        .route("/me", get(auth::me))
        // Cabinet
        .route("/cabinet", get(cabinet::summary))
        .route("/cabinet/orders", get(cabinet::list_orders))
        .route("/cabinet/orders/:id", get(cabinet::get_order))
        .route("/cabinet/profile", put(cabinet::update_profile))
        .route(
            "/cabinet/company",
            get(cabinet::get_company).put(cabinet::update_company),
        )
        .route("/cabinet/change-password", post(cabinet::change_password))
        .merge(admin_router())
}

fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/stats", get(admin::stats))
        .route(
            "/admin/settings",
            get(admin::get_site_settings).put(admin::update_site_settings),
        )
        .route(
            "/admin/ai-settings",
            get(admin::get_ai_settings).put(admin::update_ai_settings),
        )
        .route("/admin/cache/clear", post(admin::clear_cache))
        // Catalog
        .route(
            "/admin/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/admin/categories/:id",
            get(catalog::get_category)
                .put(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route(
            "/admin/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/admin/products/:id",
            get(catalog::get_product)
                .put(catalog::update_product)
                .delete(catalog::delete_product),
        )
        .route("/admin/products/:id/toggle", post(catalog::toggle_product))
        // Orders
        .route("/admin/orders", get(orders::list_orders))
        .route(
            "/admin/orders/:id",
            get(orders::get_order).delete(orders::delete_order),
        )
        .route("/admin/orders/:id/status", post(orders::update_status))
        .route("/admin/orders/:id/notes", post(orders::update_notes))
        // Partners
        .route("/admin/companies", get(partners::list_companies))
        .route(
            "/admin/companies/:id",
            get(partners::get_company).patch(partners::update_company),
        )
        .route("/admin/companies/:id/verify", post(partners::verify_company))
        .route("/admin/companies/:id/approve", post(partners::approve_company))
        .route("/admin/companies/:id/reject", post(partners::reject_company))
        .route("/admin/companies/:id/suspend", post(partners::suspend_company))
        .route("/admin/alerts", get(partners::list_alerts))
        .route("/admin/alerts/unread-count", get(partners::unread_count))
        .route("/admin/alerts/:id/read", post(partners::mark_alert_read))
        .route("/admin/alerts/:id/resolve", post(partners::resolve_alert))
        .route("/admin/verification/run", post(partners::run_verification))
        .route("/admin/verification/last-run", get(partners::last_run))
        // Blog
        .route(
            "/admin/blog",
            get(blog::admin_list_posts).post(blog::create_post),
        )
        .route(
            "/admin/blog/:id",
            get(blog::admin_get_post)
                .put(blog::update_post)
                .delete(blog::delete_post),
        )
        .route("/admin/blog/generate", post(blog::generate_post))
        .route("/admin/blog/plans", post(blog::create_plan))
        .route("/admin/blog/plans/week", get(blog::week_plan))
        .route("/admin/blog/plans/generate-due", post(blog::generate_due))
        // Contacts
        .route("/admin/contacts", get(contact::list))
        .route("/admin/contacts/read-all", post(contact::mark_all_read))
        .route("/admin/contacts/read", delete(contact::delete_read))
        .route("/admin/contacts/:id", delete(contact::delete))
        .route("/admin/contacts/:id/read", post(contact::mark_read))
        // Warehouse
        .route("/admin/warehouse/stats", get(warehouse::stats))
        .route(
            "/admin/warehouse/tasks",
            get(warehouse::list_tasks).post(warehouse::create_task),
        )
        .route(
            "/admin/warehouse/tasks/:id",
            get(warehouse::get_task).put(warehouse::update_task),
        )
        .route("/admin/warehouse/tasks/:id/pack", post(warehouse::pack_task))
        .route("/admin/warehouse/tasks/:id/ship", post(warehouse::ship_task))
        .route(
            "/admin/warehouse/tasks/:id/deliver",
            post(warehouse::deliver_task),
        )
        .route(
            "/admin/warehouse/movements",
            get(warehouse::list_movements).post(warehouse::record_movement),
        )
        .route(
            "/admin/warehouse/replenishments",
            get(warehouse::list_replenishments).post(warehouse::create_replenishment),
        )
        .route(
            "/admin/warehouse/replenishments/:id",
            get(warehouse::get_replenishment).put(warehouse::update_replenishment),
        )
        .route(
            "/admin/warehouse/replenishments/:id/receive",
            post(warehouse::receive_replenishment),
        )
        .route(
            "/admin/warehouse/expenses",
            get(warehouse::list_expenses).post(warehouse::create_expense),
        )
        .route("/admin/warehouse/low-stock", get(warehouse::list_low_stock))
        .route(
            "/admin/warehouse/low-stock/scan",
            post(warehouse::scan_low_stock),
        )
        .route(
            "/admin/warehouse/low-stock/:id/resolve",
            post(warehouse::resolve_low_stock),
        )
}
