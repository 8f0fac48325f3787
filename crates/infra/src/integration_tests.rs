//! Integration tests for the inventory pipeline.
//!
//! Tests: InventoryService → StoreTx → InMemoryInventoryStore → listings/export
//!
//! Verifies:
//! - Category and product creation round-trip through the store
//! - Filters compose and stock rules hold under both policies
//! - Deletes cascade the way the relational store does
//! - Export and import agree with each other

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use inventario_core::DomainError;
    use inventario_inventory::{NegativeStockPolicy, StockChange};

    use crate::bulk::ImportOptions;
    use crate::query::{ListingShape, ProductFilter};
    use crate::service::{InventoryError, InventoryService, ProductForm};
    use crate::store::{InMemoryInventoryStore, InventoryStore, StoreTx};

    async fn seeded(policy: NegativeStockPolicy) -> InventoryService<InMemoryInventoryStore> {
        let service = InventoryService::with_policy(InMemoryInventoryStore::new(), policy);
        service
            .ensure_seeded(&["General", "Tools"], &["Main", "Annex"])
            .await
            .unwrap();
        service
    }

    async fn branch_id(service: &InventoryService<InMemoryInventoryStore>, name: &str) -> inventario_core::BranchId {
        service.find_branch_by_name(name).await.unwrap().unwrap().id
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let report = service
            .ensure_seeded(&["Tools", "  ", "General"], &["Annex", "Main"])
            .await
            .unwrap();

        assert_eq!(report.categories_created, 0);
        assert_eq!(report.branches_created, 0);
        assert_eq!(service.list_categories().await.unwrap().len(), 2);
        assert_eq!(service.list_branches().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn creating_a_category_twice_yields_one_row() {
        let service = seeded(NegativeStockPolicy::Reject).await;

        let first = service.create_category("Garden", None).await.unwrap();
        let second = service.create_category("  Garden ", Some("again")).await.unwrap();

        assert_eq!(first.id, second.id);
        let names: Vec<String> = service
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Garden", "General", "Tools"]);
    }

    #[tokio::test]
    async fn created_product_is_found_by_exact_name() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&service, "Main").await;

        service
            .create_product(ProductForm::new("Drill", "49.90", "10.0", main))
            .await
            .unwrap();

        let listing = service
            .list_products(&ProductFilter::default().with_name("Drill"))
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        let row = &listing.rows[0];
        assert_eq!(row.product.name, "Drill");
        assert_eq!(row.product.price.to_string(), "49.90");
        assert_eq!(row.stock, 10);
        assert_eq!(row.branch_name(), Some("Main"));
    }

    #[tokio::test]
    async fn category_and_name_filters_combine() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&service, "Main").await;
        let a = service.create_category("A", None).await.unwrap();
        let b = service.create_category("B", None).await.unwrap();

        let p1 = service
            .create_product(ProductForm::new("Box", "1", "1", main).with_category(Some(a.id)))
            .await
            .unwrap();
        service
            .create_product(ProductForm::new("Boxer", "1", "1", main).with_category(Some(b.id)))
            .await
            .unwrap();

        let listing = service
            .list_products(&ProductFilter::default().with_category(a.id).with_name("Box"))
            .await
            .unwrap();
        assert_eq!(listing.product_ids(), vec![p1.id]);
    }

    #[tokio::test]
    async fn relative_adjustments_follow_the_policy() {
        for policy in [NegativeStockPolicy::Allow, NegativeStockPolicy::Reject] {
            let service = seeded(policy).await;
            let main = branch_id(&service, "Main").await;

            let product = service
                .create_product(ProductForm::new("Box", "1", "10", main))
                .await
                .unwrap();
            service
                .update_stock(product.id, main, StockChange::Adjust(-3), None)
                .await
                .unwrap();
            let entry = service
                .update_stock(product.id, main, StockChange::Adjust(1), None)
                .await
                .unwrap();
            assert_eq!(entry.stock, 8);

            service
                .update_stock(product.id, main, StockChange::Set(2), None)
                .await
                .unwrap();
            let result = service
                .update_stock(product.id, main, StockChange::Adjust(-5), None)
                .await;

            let listing = service
                .list_products(&ProductFilter::per_product())
                .await
                .unwrap();
            match policy {
                NegativeStockPolicy::Allow => {
                    assert_eq!(result.unwrap().stock, -3);
                    assert_eq!(listing.rows[0].stock, -3);
                }
                NegativeStockPolicy::Reject => {
                    assert!(matches!(
                        result,
                        Err(InventoryError::Domain(DomainError::InvariantViolation(_)))
                    ));
                    assert_eq!(listing.rows[0].stock, 2);
                }
            }
        }
    }

    #[tokio::test]
    async fn deletes_cascade_like_the_relational_schema() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&service, "Main").await;
        let annex = branch_id(&service, "Annex").await;
        let toys = service.create_category("Toys", None).await.unwrap();

        let kite = service
            .create_product(ProductForm::new("Kite", "5", "3", main).with_category(Some(toys.id)))
            .await
            .unwrap();
        let yoyo = service
            .create_product(ProductForm::new("Yoyo", "2", "4", main))
            .await
            .unwrap();
        service
            .update_stock(yoyo.id, annex, StockChange::Set(6), None)
            .await
            .unwrap();

        service.delete_category(toys.id).await.unwrap();
        assert_eq!(service.find_product(kite.id).await.unwrap().category_id, None);

        service.delete_product(yoyo.id).await.unwrap();
        let mut tx = service.store().begin().await.unwrap();
        let stock = tx.list_stock().await.unwrap();
        assert!(stock.iter().all(|e| e.product_id != yoyo.id));
        assert!(tx.list_movements(yoyo.id).await.unwrap().is_empty());
        assert_eq!(stock.len(), 1);
    }

    #[tokio::test]
    async fn export_then_import_reproduces_the_inventory() {
        let source = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&source, "Main").await;
        let annex = branch_id(&source, "Annex").await;
        let tools = source.find_category_by_name("Tools").await.unwrap().unwrap();

        let saw = source
            .create_product(ProductForm::new("Saw", "12.5", "4", main).with_category(Some(tools.id)))
            .await
            .unwrap();
        source
            .update_stock(saw.id, annex, StockChange::Set(9), None)
            .await
            .unwrap();
        source
            .create_product(ProductForm::new("Glue, strong", "3.99", "0", annex))
            .await
            .unwrap();
        // a product left without any stock entry
        let popup = source.create_branch("Pop-up", None).await.unwrap();
        source
            .create_product(ProductForm::new("Tape", "2", "5", popup.id))
            .await
            .unwrap();
        source.delete_branch(popup.id).await.unwrap();

        let exported = source.export_table(&ProductFilter::default()).await.unwrap();
        assert!(exported.rows.iter().any(|r| r[0] == "Tape" && r[2].is_empty() && r[3] == "0"));
        let bytes = exported.to_csv().unwrap();

        let target = InventoryService::new(InMemoryInventoryStore::new());
        target.ensure_seeded(&["General"], &["Main", "Annex"]).await.unwrap();
        let target_main = branch_id(&target, "Main").await;
        let report = target
            .import_csv(bytes.as_slice(), &ImportOptions::new(target_main))
            .await
            .unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.products_created, 3);
        assert_eq!(report.categories_created, 1);

        let reimported = target.export_table(&ProductFilter::default()).await.unwrap();
        assert_eq!(reimported.rows, exported.rows);
    }

    #[tokio::test]
    async fn import_updates_by_name_and_creates_once() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&service, "Main").await;
        let existing = service
            .create_product(ProductForm::new("Rope", "1", "1", main))
            .await
            .unwrap();

        let csv = "Name,Price,Stock,Category\n\
                   Rope,2.25,30,Tools\n\
                   Tent,80,2,Camping\n";
        let report = service
            .import_csv(csv.as_bytes(), &ImportOptions::new(main))
            .await
            .unwrap();

        assert_eq!(report.products_updated, 1);
        assert_eq!(report.products_created, 1);
        assert_eq!(report.categories_created, 1);

        let listing = service
            .list_products(&ProductFilter::per_product())
            .await
            .unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(listing.shape, ListingShape::PerProduct);

        let rope = listing.rows.iter().find(|r| r.product.id == existing.id).unwrap();
        assert_eq!(rope.product.price.to_string(), "2.25");
        assert_eq!(rope.category_name(), Some("Tools"));
        assert_eq!(rope.stock, 30);

        let camping: Vec<_> = service
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.name == "Camping")
            .collect();
        assert_eq!(camping.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_names_resolve_to_the_earliest_product() {
        let service = seeded(NegativeStockPolicy::Reject).await;
        let main = branch_id(&service, "Main").await;
        let first = service
            .create_product(ProductForm::new("Twin", "1", "1", main))
            .await
            .unwrap();
        let second = service
            .create_product(ProductForm::new("Twin", "1", "1", main))
            .await
            .unwrap();

        service
            .import_csv("Name,Price,Stock,Category\nTwin,1,50,\n".as_bytes(), &ImportOptions::new(main))
            .await
            .unwrap();

        let listing = service.list_products(&ProductFilter::default()).await.unwrap();
        let stock_of = |id| listing.rows.iter().find(|r| r.product.id == id).unwrap().stock;
        assert_eq!(stock_of(first.id), 50);
        assert_eq!(stock_of(second.id), 1);
    }

    /// Run `tasks` workers that each add 1 to the pair `per_task` times,
    /// retrying optimistic conflicts. Returns the number of applied adjustments.
    async fn adjust_concurrently(
        service: Arc<InventoryService<InMemoryInventoryStore>>,
        product_id: inventario_core::ProductId,
        branch: inventario_core::BranchId,
        tasks: usize,
        per_task: usize,
    ) -> i64 {
        let mut handles = Vec::new();
        for _ in 0..tasks {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let mut applied: i64 = 0;
                for _ in 0..per_task {
                    // optimistic commits may conflict; retry until one lands
                    loop {
                        match service
                            .update_stock(product_id, branch, StockChange::Adjust(1), None)
                            .await
                        {
                            Ok(_) => break,
                            Err(InventoryError::Store(crate::store::StoreError::Conflict(_))) => {
                                tokio::task::yield_now().await
                            }
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                    applied += 1;
                }
                applied
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        total
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjustments_never_lose_updates() {
        let service = Arc::new(seeded(NegativeStockPolicy::Allow).await);
        let main = branch_id(&service, "Main").await;
        let product = service
            .create_product(ProductForm::new("Widget", "1", "0", main))
            .await
            .unwrap();

        let total = adjust_concurrently(service.clone(), product.id, main, 8, 5).await;

        let listing = service.list_products(&ProductFilter::per_product()).await.unwrap();
        assert_eq!(listing.rows[0].stock, total);
        assert_eq!(service.movements(product.id).await.unwrap().len(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adjustments_on_a_fresh_pair_never_lose_updates() {
        let service = Arc::new(seeded(NegativeStockPolicy::Allow).await);
        let main = branch_id(&service, "Main").await;
        let annex = branch_id(&service, "Annex").await;
        let product = service
            .create_product(ProductForm::new("Widget", "1", "0", main))
            .await
            .unwrap();

        let total = adjust_concurrently(service.clone(), product.id, annex, 6, 4).await;
        assert_eq!(total, 24);

        let listing = service
            .list_products(&ProductFilter::default().with_branch(annex))
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing.rows[0].stock, 24);
    }
}
