use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, CreateAddressRequest},
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, UpdateCartItemRequest},
        inventory::{
            BulkAdjustRequest, BulkAdjustResult, FailedAdjustment, InventoryAdjustRequest,
            InventoryStatus, InventoryStatusQuery, LowStockEntry, LowStockList, LowStockQuery,
            StockAdjustment,
        },
        orders::{CheckoutRequest, OrderDetail, OrderList, UpdateOrderStatusRequest},
        payments::{ConfirmPaymentRequest, CreatePaymentRequest, FailPaymentRequest},
        products::{
            CreateProductRequest, CreateVariantRequest, ProductDetail, ProductList,
            UpdateProductRequest,
        },
    },
    entity::sea_orm_active_enums::{OrderStatus, PaymentStatus},
    error::ErrorData,
    models::{
        Address, Cart, CartItem, Order, OrderItem, OrderStatusEntry, Payment, Product,
        ProductVariant, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, health, orders, params, payments,
        products as product_routes,
    },
    services::inventory_service::StockRef,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        product_routes::create_variant,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        addresses::list_addresses,
        addresses::create_address,
        addresses::get_address,
        addresses::delete_address,
        payments::create_payment,
        payments::confirm_payment,
        payments::fail_payment,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_low_stock,
        admin::inventory_status,
        admin::adjust_inventory,
        admin::bulk_adjust
    ),
    components(
        schemas(
            User,
            Product,
            ProductVariant,
            Address,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatusEntry,
            OrderStatus,
            Payment,
            PaymentStatus,
            StockRef,
            ErrorData,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            UpdateCartItemRequest,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            OrderDetail,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            CreateVariantRequest,
            ProductList,
            ProductDetail,
            CreateAddressRequest,
            AddressList,
            CreatePaymentRequest,
            ConfirmPaymentRequest,
            FailPaymentRequest,
            LowStockQuery,
            LowStockEntry,
            LowStockList,
            InventoryAdjustRequest,
            InventoryStatusQuery,
            InventoryStatus,
            StockAdjustment,
            BulkAdjustRequest,
            FailedAdjustment,
            BulkAdjustResult,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<ProductDetail>,
            ApiResponse<Cart>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>,
            ApiResponse<Payment>,
            ApiResponse<InventoryStatus>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Addresses", description = "Shipping and billing addresses"),
        (name = "Payments", description = "Payment records"),
        (name = "Admin", description = "Admin order and inventory endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
