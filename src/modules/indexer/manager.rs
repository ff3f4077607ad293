//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::Path;

use tantivy::{
    collector::{Count, TopDocs},
    directory::MmapDirectory,
    indexer::UserOperation,
    query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery},
    schema::IndexRecordOption,
    DocAddress, Index, IndexReader, IndexWriter, Order, ReloadPolicy, Searcher, TantivyDocument,
    Term,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    modules::{
        classifier::Category,
        error::{code::ErrorCode, OneboxResult},
        indexer::{document::EmailDocument, fields::F_DATE, schema::SchemaTools},
        message::search::{ListFilter, SortDirection},
    },
    raise_error,
};

const WRITER_HEAP_BYTES: usize = 64 * 1024 * 1024;

/// Handle on the on-disk email index.
///
/// Opened once at startup and shared by reference. Writes go through a single
/// writer behind an async mutex and are committed one operation batch at a
/// time; the reader is reloaded after every commit so reads observe them.
pub struct EmailIndex {
    writer: Mutex<Option<IndexWriter>>,
    reader: IndexReader,
    query_parser: QueryParser,
}

impl EmailIndex {
    pub fn open(index_dir: &Path) -> OneboxResult<Self> {
        std::fs::create_dir_all(index_dir)?;
        let directory = MmapDirectory::open(index_dir).map_err(|e| {
            raise_error!(
                format!("Failed to open index directory {:?}: {}", index_dir, e),
                ErrorCode::InternalError
            )
        })?;
        let index = Index::open_or_create(directory, SchemaTools::email_schema())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        let mut query_parser = QueryParser::for_index(&index, SchemaTools::email_default_fields());
        query_parser.set_conjunction_by_default();

        info!("Email index opened at {:?}", index_dir);
        Ok(Self {
            writer: Mutex::new(Some(writer)),
            reader,
            query_parser,
        })
    }

    /// Replaces the document with the same id, or adds it.
    pub async fn upsert(&self, email: &EmailDocument) -> OneboxResult<()> {
        self.apply(vec![
            UserOperation::Delete(Self::id_term(&email.id)),
            UserOperation::Add(email.to_document()),
        ])
        .await
    }

    pub async fn get(&self, id: &str) -> OneboxResult<Option<EmailDocument>> {
        let searcher = self.reader.searcher();
        match Self::find_doc(&searcher, id)? {
            Some(doc) => Ok(Some(EmailDocument::from_tantivy_doc(&doc)?)),
            None => Ok(None),
        }
    }

    /// Rewrites only the category of a stored email. Every other stored field
    /// is copied over unchanged. Returns `None` when the id is unknown.
    pub async fn update_category(
        &self,
        id: &str,
        category: Category,
    ) -> OneboxResult<Option<EmailDocument>> {
        let f_category = SchemaTools::email_fields().f_category;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(Self::closed_error)?;

        let searcher = self.reader.searcher();
        let Some(old_doc) = Self::find_doc(&searcher, id)? else {
            return Ok(None);
        };

        let mut new_doc = TantivyDocument::new();
        for (field, value) in old_doc.field_values() {
            if field != f_category {
                new_doc.add_field_value(field, value);
            }
        }
        new_doc.add_text(f_category, category.label());
        let updated = EmailDocument::from_tantivy_doc(&new_doc)?;

        self.commit(
            writer,
            vec![
                UserOperation::Delete(Self::id_term(id)),
                UserOperation::Add(new_doc),
            ],
        )?;
        Ok(Some(updated))
    }

    /// Up to `limit` emails matching every present filter, ordered by date.
    pub async fn list(&self, filter: &ListFilter, limit: usize) -> OneboxResult<Vec<EmailDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query = self.filter_query(filter);
        let searcher = self.reader.searcher();
        let order = match filter.sort {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let hits: Vec<(i64, DocAddress)> = searcher
            .search(
                query.as_ref(),
                &TopDocs::with_limit(limit).order_by_fast_field(F_DATE, order),
            )
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;

        let mut result = Vec::with_capacity(hits.len());
        for (_, address) in hits {
            let doc: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            result.push(EmailDocument::from_tantivy_doc(&doc)?);
        }
        Ok(result)
    }

    /// Deletes the emails of one mailbox folder that were stored under a
    /// UIDVALIDITY other than `uid_validity`. Returns how many were removed.
    pub async fn purge_stale(
        &self,
        account: &str,
        folder: &str,
        uid_validity: u32,
    ) -> OneboxResult<u64> {
        let f = SchemaTools::email_fields();
        let term = |field, value: &str| -> Box<dyn Query> {
            Box::new(TermQuery::new(
                Term::from_field_text(field, value),
                IndexRecordOption::Basic,
            ))
        };
        let query = BooleanQuery::new(vec![
            (Occur::Must, term(f.f_account, account)),
            (Occur::Must, term(f.f_folder, folder)),
            (
                Occur::MustNot,
                Box::new(TermQuery::new(
                    Term::from_field_u64(f.f_uid_validity, uid_validity as u64),
                    IndexRecordOption::Basic,
                )),
            ),
        ]);

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(Self::closed_error)?;
        let stale = self
            .reader
            .searcher()
            .search(&query, &Count)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        if stale == 0 {
            return Ok(0);
        }
        writer
            .delete_query(Box::new(query))
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        self.commit_pending(writer)?;
        Ok(stale as u64)
    }

    pub fn count(&self) -> OneboxResult<u64> {
        let searcher = self.reader.searcher();
        let total = searcher
            .search(&AllQuery, &Count)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(total as u64)
    }

    /// Final commit and merge wait. Later writes fail with `IndexClosed`.
    pub async fn close(&self) -> OneboxResult<()> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        writer
            .commit()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        writer
            .wait_merging_threads()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        info!("Email index closed");
        Ok(())
    }

    async fn apply(&self, operations: Vec<UserOperation>) -> OneboxResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(Self::closed_error)?;
        self.commit(writer, operations)
    }

    fn commit(&self, writer: &mut IndexWriter, operations: Vec<UserOperation>) -> OneboxResult<()> {
        writer
            .run(operations)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        self.commit_pending(writer)
    }

    fn commit_pending(&self, writer: &mut IndexWriter) -> OneboxResult<()> {
        if let Err(e) = writer.commit() {
            warn!("Index commit failed, discarding pending operations: {:#?}", e);
            if let Err(rollback) = writer.rollback() {
                warn!("Index rollback failed: {:#?}", rollback);
            }
            return Err(raise_error!(format!("{:#?}", e), ErrorCode::InternalError));
        }
        self.reader
            .reload()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }

    fn filter_query(&self, filter: &ListFilter) -> Box<dyn Query> {
        let f = SchemaTools::email_fields();
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for (field, value) in [
            (f.f_folder, &filter.folder),
            (f.f_account, &filter.account),
            (f.f_category, &filter.category),
        ] {
            if let Some(value) = value {
                subqueries.push((
                    Occur::Must,
                    Box::new(TermQuery::new(
                        Term::from_field_text(field, value),
                        IndexRecordOption::Basic,
                    )),
                ));
            }
        }

        if let Some(text) = &filter.search {
            let (query, errors) = self.query_parser.parse_query_lenient(text);
            if !errors.is_empty() {
                warn!("Lenient search query '{}' had parse errors: {:?}", text, errors);
            }
            subqueries.push((Occur::Must, query));
        }

        if subqueries.is_empty() {
            Box::new(AllQuery)
        } else {
            Box::new(BooleanQuery::new(subqueries))
        }
    }

    fn find_doc(searcher: &Searcher, id: &str) -> OneboxResult<Option<TantivyDocument>> {
        let query = TermQuery::new(Self::id_term(id), IndexRecordOption::Basic);
        let docs = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        match docs.first() {
            Some((_, address)) => {
                let doc = searcher
                    .doc(*address)
                    .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn id_term(id: &str) -> Term {
        Term::from_field_text(SchemaTools::email_fields().f_id, id)
    }

    fn closed_error() -> crate::modules::error::OneboxError {
        raise_error!(
            "The email index has been closed".into(),
            ErrorCode::IndexClosed
        )
    }
}
