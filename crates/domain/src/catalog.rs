//! Catalog administration.

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{NewProduct, Page, PageRequest, Product, Store, Transaction};

use crate::error::OrderError;
use crate::identity::Identity;
use crate::unit_of_work;

/// Partial update of a product. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub stock_quantity: Option<i32>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Returns true if the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.stock_quantity.is_none()
            && self.is_active.is_none()
    }

    fn apply(self, product: &mut Product) -> Result<(), OrderError> {
        if let Some(name) = self.name {
            validate_name(&name)?;
            product.name = name;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
            product.price = price;
        }
        if let Some(stock) = self.stock_quantity {
            if stock < 0 {
                return Err(OrderError::Validation(
                    "stock cannot be negative".to_string(),
                ));
            }
            product.stock_quantity = stock;
        }
        if let Some(is_active) = self.is_active {
            product.is_active = is_active;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), OrderError> {
    if name.trim().is_empty() {
        return Err(OrderError::Validation(
            "product name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<(), OrderError> {
    if price.is_negative() {
        return Err(OrderError::Validation(
            "price cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn require_admin(actor: &Identity) -> Result<(), OrderError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(OrderError::Forbidden(
            "only administrators can manage the catalog".to_string(),
        ))
    }
}

/// Service for reading and administering the product catalog.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds an active product to the catalog.
    #[tracing::instrument(skip(self, actor, product), fields(actor = %actor.id, name = %product.name))]
    pub async fn create_product(
        &self,
        actor: &Identity,
        product: NewProduct,
    ) -> Result<Product, OrderError> {
        require_admin(actor)?;
        validate_name(&product.name)?;
        validate_price(product.price)?;
        if product.stock_quantity < 0 {
            return Err(OrderError::Validation(
                "stock cannot be negative".to_string(),
            ));
        }

        let product = self.store.insert_product(product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Applies a partial update under the product's row lock.
    #[tracing::instrument(skip(self, actor, update), fields(actor = %actor.id))]
    pub async fn update_product(
        &self,
        actor: &Identity,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, OrderError> {
        require_admin(actor)?;

        let mut tx = self.store.begin().await?;
        let outcome = update_in(&mut tx, id, update).await;
        let product = unit_of_work::finish(tx, outcome).await?;

        tracing::info!(product_id = %product.id, stock = product.stock_quantity, "product updated");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, OrderError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| OrderError::product_not_found(id))
    }

    pub async fn list_products(&self, page: PageRequest) -> Result<Page<Product>, OrderError> {
        Ok(self.store.list_products(page).await?)
    }
}

impl<S: Store + Clone> Clone for CatalogService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

async fn update_in<Tx: Transaction>(
    tx: &mut Tx,
    id: ProductId,
    update: ProductUpdate,
) -> Result<Product, OrderError> {
    let mut product = tx
        .lock_products(&[id])
        .await?
        .pop()
        .ok_or_else(|| OrderError::product_not_found(id))?;

    if update.is_empty() {
        return Ok(product);
    }

    update.apply(&mut product)?;
    tx.update_product(&product).await?;
    Ok(product)
}
