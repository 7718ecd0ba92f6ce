use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use fake::faker::company::en::CompanyName;
use fake::faker::lorem::en::Sentence;
use fake::{Fake, Faker};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;
use watcard_repo::task_repo::NewTask;
use watcard_repo::transaction_repo::{Category, NewTransaction};

trait Generator<T> {
    fn gen(&mut self) -> T;
}

struct Predefined<T> {
    values: Vec<T>,
    current_pos: usize,
}

impl<T> Predefined<T> {
    fn boxed(values: Vec<T>) -> Box<Predefined<T>> {
        Box::new(Predefined {
            values,
            current_pos: 0,
        })
    }
}

impl<T: Clone> Generator<T> for Predefined<T> {
    fn gen(&mut self) -> T {
        let v = self.values[self.current_pos].clone();
        self.current_pos += 1;
        v
    }
}

struct RandomSample<T> {
    values: Vec<T>,
}

impl<T> RandomSample<T> {
    fn boxed(values: Vec<T>) -> Box<RandomSample<T>> {
        Box::new(RandomSample { values })
    }
}

impl<T: Clone> Generator<T> for RandomSample<T> {
    fn gen(&mut self) -> T {
        self.values.choose(&mut rand::thread_rng()).unwrap().clone()
    }
}

struct FakeGenerator<F: Fake> {
    fake: F,
}

impl<F: Fake> FakeGenerator<F> {
    fn boxed(fake: F) -> Box<FakeGenerator<F>> {
        Box::new(FakeGenerator { fake })
    }
}

impl<T: fake::Dummy<F>, F> Generator<T> for FakeGenerator<F> {
    fn gen(&mut self) -> T {
        self.fake.fake()
    }
}

/// Positive amounts with cents, as a WatCard terminal would record them.
struct FakeAmount;

impl Generator<Decimal> for FakeAmount {
    fn gen(&mut self) -> Decimal {
        Decimal::new(rand::thread_rng().gen_range(1..100_000), 2)
    }
}

/// Dates within the 2025 fall term.
struct TermDate;

impl Generator<NaiveDate> for TermDate {
    fn gen(&mut self) -> NaiveDate {
        let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        start
            .checked_add_days(Days::new(rand::thread_rng().gen_range(0..120)))
            .unwrap()
    }
}

struct FakeTime;

impl Generator<Option<NaiveTime>> for FakeTime {
    fn gen(&mut self) -> Option<NaiveTime> {
        let mut rng = rand::thread_rng();
        NaiveTime::from_hms_opt(rng.gen_range(7..23), rng.gen_range(0..60), 0)
    }
}

pub struct NewTransactionGenerator {
    cat_gen: Box<dyn Generator<Category>>,
    vend_gen: Box<dyn Generator<String>>,
    desc_gen: Box<dyn Generator<Option<String>>>,
    date_gen: Box<dyn Generator<NaiveDate>>,
    time_gen: Box<dyn Generator<Option<NaiveTime>>>,
    amnt_gen: Box<dyn Generator<Decimal>>,
}

#[allow(dead_code)]
impl NewTransactionGenerator {
    pub fn with_categories(mut self, categories: Vec<Category>) -> NewTransactionGenerator {
        self.cat_gen = Predefined::boxed(categories);
        self
    }

    pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> NewTransactionGenerator {
        self.date_gen = Predefined::boxed(dates);
        self
    }

    pub fn with_amounts(mut self, amounts: Vec<Decimal>) -> NewTransactionGenerator {
        self.amnt_gen = Predefined::boxed(amounts);
        self
    }

    pub fn generate(&mut self) -> NewTransaction {
        let mut new_transaction = NewTransaction::new(
            self.date_gen.gen(),
            self.amnt_gen.gen(),
            self.vend_gen.gen(),
            self.cat_gen.gen(),
        );
        new_transaction.time = self.time_gen.gen();
        new_transaction.description = self.desc_gen.gen();
        new_transaction
    }

    /// Like [`generate`](Self::generate), but as if imported from WatCard.
    pub fn generate_imported(&mut self) -> NewTransaction {
        let mut new_transaction = self.generate();
        new_transaction.is_manual = false;
        new_transaction.watcard_transaction_id = Some(Uuid::new_v4().to_string());
        new_transaction
    }

    pub fn generate_many(&mut self, count: usize) -> Vec<NewTransaction> {
        let mut vec = Vec::with_capacity(count);
        for _ in 0..count {
            vec.push(self.generate())
        }
        vec
    }
}

impl Default for NewTransactionGenerator {
    fn default() -> Self {
        NewTransactionGenerator {
            cat_gen: RandomSample::boxed(Category::ALL.to_vec()),
            vend_gen: FakeGenerator::boxed(CompanyName()),
            desc_gen: FakeGenerator::boxed(Sentence(3..8)),
            date_gen: Box::new(TermDate),
            time_gen: Box::new(FakeTime),
            amnt_gen: Box::new(FakeAmount),
        }
    }
}

pub struct NewTaskGenerator {
    type_gen: Box<dyn Generator<Option<String>>>,
    due_gen: Box<dyn Generator<Option<NaiveDateTime>>>,
}

#[allow(dead_code)]
impl NewTaskGenerator {
    pub fn with_dues(mut self, dues: Vec<Option<NaiveDateTime>>) -> NewTaskGenerator {
        self.due_gen = Predefined::boxed(dues);
        self
    }

    /// Items are unique per call so that generated tasks never collide.
    pub fn generate(&mut self) -> NewTask {
        let words: String = Sentence(2..4).fake();
        let item = format!("{} {}", words, &Uuid::new_v4().to_string()[..8]);
        NewTask::new(item, self.type_gen.gen(), None, self.due_gen.gen())
    }

    pub fn generate_many(&mut self, count: usize) -> Vec<NewTask> {
        let mut vec = Vec::with_capacity(count);
        for _ in 0..count {
            vec.push(self.generate())
        }
        vec
    }
}

struct FakeDue;

impl Generator<Option<NaiveDateTime>> for FakeDue {
    fn gen(&mut self) -> Option<NaiveDateTime> {
        let date = TermDate.gen();
        let hour = rand::thread_rng().gen_range(8..22);
        Faker
            .fake::<bool>()
            .then(|| date.and_hms_opt(hour, 0, 0).unwrap())
    }
}

impl Default for NewTaskGenerator {
    fn default() -> Self {
        NewTaskGenerator {
            type_gen: RandomSample::boxed(vec![
                None,
                Some("errand".to_string()),
                Some("study".to_string()),
                Some("assignment".to_string()),
            ]),
            due_gen: Box::new(FakeDue),
        }
    }
}
